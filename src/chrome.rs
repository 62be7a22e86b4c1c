/// Host capabilities backed by the chrome.* extension APIs
use crate::error::{Error, Result};
use crate::host::{Runtime, SettingsStore, TabsApi};
use crate::tab_data::{GroupInfo, GroupUpdate, TabInfo, TabQuery, WindowInfo};
use futures::future::LocalBoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

// Import JS bridge functions
#[wasm_bindgen(module = "/chrome_bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn queryTabs(query: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryGroups() -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getGroup(group_id: i32) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getWindow(window_id: i32) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn moveTab(tab_id: i32, index: i32) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn groupTabs(tab_ids: JsValue, group_id: Option<i32>) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateGroup(group_id: i32, update: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(keys: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(items: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn delay(ms: u32) -> std::result::Result<(), JsValue>;
}

/// The real browser, as seen from the background service worker
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeHost;

impl ChromeHost {
    pub fn new() -> ChromeHost {
        ChromeHost
    }
}

fn host_error(call: &str, err: JsValue) -> Error {
    let message = err
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    Error::Host(format!("{}: {}", call, message))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    // Plain objects rather than ES Maps, so chrome.* accepts them
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| Error::MalformedInput(e.to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| Error::MalformedInput(e.to_string()))
}

impl TabsApi for ChromeHost {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>> {
        let tabs = queryTabs(to_js(&query)?)
            .await
            .map_err(|e| host_error("tabs.query", e))?;
        from_js(tabs)
    }

    async fn query_groups(&self) -> Result<Vec<GroupInfo>> {
        let groups = queryGroups()
            .await
            .map_err(|e| host_error("tabGroups.query", e))?;
        from_js(groups)
    }

    async fn get_group(&self, group_id: i32) -> Result<GroupInfo> {
        // Chrome rejects with "No group with id" once the group has closed
        let group = getGroup(group_id).await.map_err(|e| {
            log::debug!("{}", host_error("tabGroups.get", e));
            Error::NotFound {
                what: "group",
                id: group_id,
            }
        })?;
        from_js(group)
    }

    async fn get_window(&self, window_id: i32) -> Result<WindowInfo> {
        let window = getWindow(window_id).await.map_err(|e| {
            log::debug!("{}", host_error("windows.get", e));
            Error::NotFound {
                what: "window",
                id: window_id,
            }
        })?;
        from_js(window)
    }

    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<()> {
        moveTab(tab_id, index)
            .await
            .map_err(|e| host_error("tabs.move", e))
    }

    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32> {
        let group = groupTabs(to_js(tab_ids)?, group_id)
            .await
            .map_err(|e| host_error("tabs.group", e))?;
        from_js(group)
    }

    async fn update_group(&self, group_id: i32, update: GroupUpdate) -> Result<()> {
        updateGroup(group_id, to_js(&update)?)
            .await
            .map_err(|e| host_error("tabGroups.update", e))
    }
}

impl SettingsStore for ChromeHost {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let items = getStorage(to_js(keys)?)
            .await
            .map_err(|e| host_error("storage.local.get", e))?;
        if items.is_null() || items.is_undefined() {
            return Ok(Map::new());
        }
        from_js(items)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        setStorage(to_js(&items)?)
            .await
            .map_err(|e| host_error("storage.local.set", e))
    }
}

impl Runtime for ChromeHost {
    async fn sleep(&self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        if let Err(e) = delay(ms).await {
            log::warn!("{}", host_error("setTimeout", e));
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }
}
