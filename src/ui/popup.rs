/// Popup UI for Tab Grouper extension

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use patternfly_yew::prelude::*;
use serde::Serialize;
use serde_json::json;
use crate::engine::Response;
use crate::tab_data::SortMethod;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;
}

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Loading(String),
    Done(String),
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Idle);
    let sort_method = use_state(|| SortMethod::Domain);
    let force_move = use_state(|| false);

    let on_method_change = {
        let sort_method = sort_method.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                if let Ok(method) = select.value().parse::<SortMethod>() {
                    sort_method.set(method);
                }
            }
        })
    };

    let on_force_change = {
        let force_move = force_move.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                force_move.set(input.checked());
            }
        })
    };

    // Sort every group handler
    let on_sort_all = {
        let state = state.clone();
        let sort_method = sort_method.clone();

        Callback::from(move |_| {
            let state = state.clone();
            let message = json!({"action": "sortAllTabs", "sortMethod": sort_method.as_str()});

            state.set(AppState::Loading("Sorting groups...".to_string()));

            spawn_local(async move {
                match send(message).await {
                    Ok(_) => state.set(AppState::Done("All groups sorted".to_string())),
                    Err(e) => state.set(AppState::Error(format!("Sort failed: {}", e))),
                }
            });
        })
    };

    // Apply URL rules handler
    let on_apply_rules = {
        let state = state.clone();
        let force_move = force_move.clone();

        Callback::from(move |_| {
            let state = state.clone();
            let message = json!({"action": "applyRules", "forceMove": *force_move});

            state.set(AppState::Loading("Applying rules...".to_string()));

            spawn_local(async move {
                match send(message).await {
                    Ok(response) => {
                        let moved = response.updated.unwrap_or_default();
                        state.set(AppState::Done(format!("Moved {} tabs", moved)));
                    }
                    Err(e) => state.set(AppState::Error(format!("Applying rules failed: {}", e))),
                }
            });
        })
    };

    let is_busy = matches!(*state, AppState::Loading(_));

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Tab Grouper"}</h1>

            <div class="flex-column-gap">
                <label class="pf-v5-c-form__label" for="sort-method">
                    <span class="pf-v5-c-form__label-text">{"Sort method"}</span>
                </label>
                <select id="sort-method" class="pf-v5-c-form-control" onchange={on_method_change} disabled={is_busy}>
                    {for SortMethod::ALL.iter().map(|method| html! {
                        <option value={method.as_str()} selected={*method == *sort_method}>
                            {method.label()}
                        </option>
                    })}
                </select>

                <Button onclick={on_sort_all} disabled={is_busy} variant={ButtonVariant::Primary} block={true}>
                    {"Sort all groups"}
                </Button>

                <label class="pf-v5-c-check">
                    <input
                        class="pf-v5-c-check__input"
                        type="checkbox"
                        checked={*force_move}
                        onchange={on_force_change}
                        disabled={is_busy}
                    />
                    <span class="pf-v5-c-check__label">{"Also move tabs that are already grouped"}</span>
                </label>

                <Button onclick={on_apply_rules} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                    {"Apply rules to all tabs"}
                </Button>
            </div>

            // Status display
            {match &*state {
                AppState::Loading(msg) => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{msg}</p>
                    </div>
                },
                AppState::Done(msg) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Success} title={msg.clone()} inline={true}>
                        </Alert>
                    </div>
                },
                AppState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                AppState::Idle => html! {}
            }}

            <p class="footer-popup">
                {"Tab Grouper v0.1.0"}
            </p>
        </div>
    }
}

// Helper functions

/// Send a request to the background worker and unwrap its response
async fn send(message: serde_json::Value) -> Result<Response, String> {
    let message_js = message
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize: {:?}", e))?;

    let response_js = sendMessage(message_js)
        .await
        .map_err(|e| format!("No answer from background: {:?}", e))?;

    let response: Response = serde_wasm_bindgen::from_value(response_js)
        .map_err(|e| format!("Failed to parse response: {:?}", e))?;

    if response.success {
        Ok(response)
    } else {
        Err(response.error.unwrap_or_else(|| "unknown error".to_string()))
    }
}
