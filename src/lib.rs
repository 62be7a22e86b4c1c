/// Tab Grouper - Chrome Extension that files new tabs into groups and keeps groups sorted
/// Built with Rust + WASM + Yew

mod domain;
mod tab_data;
mod operations;
mod storage;
mod error;
mod host;
mod rules;
mod resolver;
mod sorter;
mod scheduler;
mod engine;
mod chrome;
pub mod ui;

#[cfg(test)]
mod testing;

use chrome::ChromeHost;
use engine::{GrouperOptions, Request, Response, TabChange, TabGrouper};
use std::rc::Rc;
use tab_data::TabInfo;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export core domain functions for JavaScript access
#[wasm_bindgen]
pub fn extract_domain(url: &str) -> String {
    domain::domain(url)
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

fn grouper() -> TabGrouper<ChromeHost> {
    TabGrouper::new(Rc::new(ChromeHost::new()), GrouperOptions::default())
}

fn parse_tab(tab: JsValue) -> Option<TabInfo> {
    match serde_wasm_bindgen::from_value(tab) {
        Ok(tab) => Some(tab),
        Err(e) => {
            log::warn!("Ignoring tab event with unreadable tab: {}", e);
            None
        }
    }
}

/// Listener for `chrome.tabs.onCreated`
#[wasm_bindgen]
pub fn on_tab_created(tab: JsValue) {
    let Some(tab) = parse_tab(tab) else {
        return;
    };
    spawn_local(async move {
        grouper().on_tab_created(&tab).await;
    });
}

/// Listener for `chrome.tabs.onUpdated`
#[wasm_bindgen]
pub fn on_tab_updated(tab_id: i32, change_info: JsValue, tab: JsValue) {
    let change: TabChange = match serde_wasm_bindgen::from_value(change_info) {
        Ok(change) => change,
        Err(e) => {
            log::warn!("Ignoring update of tab {}: {}", tab_id, e);
            return;
        }
    };
    if change.url.is_none() && change.group_id.is_none() {
        return;
    }
    let Some(tab) = parse_tab(tab) else {
        return;
    };
    spawn_local(async move {
        grouper().on_tab_updated(&tab, &change).await;
    });
}

/// Listener for `chrome.runtime.onMessage`; resolves to the response object
#[wasm_bindgen]
pub fn on_message(message: JsValue) -> js_sys::Promise {
    future_to_promise(async move {
        let response = match serde_wasm_bindgen::from_value::<Request>(message) {
            Ok(request) => grouper().handle_request(request).await,
            Err(e) => Response::failed(format!("unknown request: {}", e)),
        };
        serde_wasm_bindgen::to_value(&response).map_err(JsValue::from)
    })
}
