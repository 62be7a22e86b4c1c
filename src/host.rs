/// Capabilities the grouping core needs from the browser
///
/// The core only queries tabs and asks for position or membership changes;
/// it never creates or closes tabs. Everything is single-threaded (the
/// extension runs in one service worker), so futures are not `Send`.
use crate::error::Result;
use crate::tab_data::{GroupInfo, GroupUpdate, TabInfo, TabQuery, WindowInfo};
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};
use std::time::Duration;

/// The browser's tabs, tabGroups and windows APIs
#[allow(async_fn_in_trait)]
pub trait TabsApi {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>>;

    async fn query_groups(&self) -> Result<Vec<GroupInfo>>;

    /// Fails with `Error::NotFound` once the group has closed
    async fn get_group(&self, group_id: i32) -> Result<GroupInfo>;

    async fn get_window(&self, window_id: i32) -> Result<WindowInfo>;

    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<()>;

    /// Adds tabs to `group_id`, or to a brand-new group when it is `None`
    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32>;

    async fn update_group(&self, group_id: i32, update: GroupUpdate) -> Result<()>;
}

/// Flat key-value settings storage
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    /// Missing keys are simply absent from the returned map
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    async fn set(&self, items: Map<String, Value>) -> Result<()>;
}

/// Timers and detached tasks
#[allow(async_fn_in_trait)]
pub trait Runtime {
    async fn sleep(&self, delay: Duration);

    /// Run `task` to completion without giving the caller a handle to it
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

/// Everything the grouping engine talks to
pub trait Host: TabsApi + SettingsStore + Runtime {}

impl<T: TabsApi + SettingsStore + Runtime> Host for T {}
