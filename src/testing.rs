/// In-memory browser for tests
///
/// Models per-window tab order, groups, windows and chrome.storage.local,
/// records every mutation, and runs time on a virtual clock: `sleep`
/// advances it instantly and spawned tasks sit in a queue until
/// `run_spawned` drains them.
use crate::error::{Error, Result};
use crate::host::{Runtime, SettingsStore, TabsApi};
use crate::tab_data::{GroupInfo, GroupUpdate, TAB_GROUP_ID_NONE, TabInfo, TabQuery, WindowInfo, WindowType};
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

type Timer = (Duration, Box<dyn FnOnce(&FakeBrowser)>);

#[derive(Default)]
struct State {
    windows: BTreeMap<i32, (WindowType, Vec<TabInfo>)>,
    groups: Vec<GroupInfo>,
    storage: Map<String, Value>,
    next_tab_id: i32,
    next_group_id: i32,
    moves: Vec<(i32, i32)>,
    group_calls: Vec<(Vec<i32>, Option<i32>)>,
    storage_writes: usize,
    fail_tab_queries: bool,
    fail_group_queries: bool,
    fail_grouping: bool,
    failing_moves: HashSet<i32>,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

#[derive(Default)]
pub struct FakeBrowser {
    state: RefCell<State>,
    timers: RefCell<Vec<Timer>>,
    tasks: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl FakeBrowser {
    pub fn new() -> FakeBrowser {
        let browser = FakeBrowser::default();
        {
            let mut state = browser.state.borrow_mut();
            state.next_tab_id = 1;
            state.next_group_id = 1;
        }
        browser
    }

    // ---- setup ----

    pub fn add_window(&self, window_type: WindowType) -> i32 {
        let mut state = self.state.borrow_mut();
        let id = state.windows.keys().last().map_or(1, |last| last + 1);
        state.windows.insert(id, (window_type, Vec::new()));
        id
    }

    pub fn add_group(&self, title: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        let id = state.next_group_id;
        state.next_group_id += 1;
        state.groups.push(GroupInfo {
            id,
            title: title.to_string(),
            color: "grey".to_string(),
            window_id: 1,
        });
        id
    }

    pub fn add_tab(&self, window_id: i32, url: &str, title: &str) -> i32 {
        self.add_tab_in_group(window_id, url, title, TAB_GROUP_ID_NONE)
    }

    pub fn add_tab_in_group(&self, window_id: i32, url: &str, title: &str, group_id: i32) -> i32 {
        let mut state = self.state.borrow_mut();
        let id = state.next_tab_id;
        state.next_tab_id += 1;

        let mut tab = TabInfo::new(id, window_id, url, title);
        tab.group_id = group_id;
        state
            .windows
            .entry(window_id)
            .or_insert_with(|| (WindowType::Normal, Vec::new()))
            .1
            .push(tab);
        id
    }

    pub fn set_url(&self, tab_id: i32, url: &str) {
        self.with_tab(tab_id, |tab| tab.url = url.to_string());
    }

    pub fn set_pinned(&self, tab_id: i32) {
        self.with_tab(tab_id, |tab| tab.pinned = true);
    }

    /// Close a group the way the browser does when its last tab goes away
    pub fn close_group(&self, group_id: i32) {
        let mut state = self.state.borrow_mut();
        state.groups.retain(|group| group.id != group_id);
        for (_, tabs) in state.windows.values_mut() {
            for tab in tabs.iter_mut().filter(|tab| tab.group_id == group_id) {
                tab.group_id = TAB_GROUP_ID_NONE;
            }
        }
    }

    pub fn set_storage(&self, value: Value) {
        if let Value::Object(items) = value {
            self.state.borrow_mut().storage.extend(items);
        }
    }

    pub fn fail_tab_queries(&self) {
        self.state.borrow_mut().fail_tab_queries = true;
    }

    pub fn fail_group_queries(&self) {
        self.state.borrow_mut().fail_group_queries = true;
    }

    pub fn fail_grouping(&self) {
        self.state.borrow_mut().fail_grouping = true;
    }

    pub fn fail_moves_of(&self, tab_id: i32) {
        self.state.borrow_mut().failing_moves.insert(tab_id);
    }

    /// Run `action` once the virtual clock reaches `at`
    pub fn at_elapsed(&self, at: Duration, action: impl FnOnce(&FakeBrowser) + 'static) {
        self.timers.borrow_mut().push((at, Box::new(action)));
    }

    // ---- inspection ----

    /// Snapshot of a tab as an event would carry it
    pub fn tab(&self, tab_id: i32) -> TabInfo {
        self.all_tabs()
            .into_iter()
            .find(|tab| tab.id == tab_id)
            .unwrap_or_else(|| panic!("no tab {tab_id}"))
    }

    pub fn group(&self, group_id: i32) -> Option<GroupInfo> {
        self.state
            .borrow()
            .groups
            .iter()
            .find(|group| group.id == group_id)
            .cloned()
    }

    pub fn group_count(&self) -> usize {
        self.state.borrow().groups.len()
    }

    pub fn group_order(&self, group_id: i32) -> Vec<i32> {
        self.ids_matching(TabQuery::in_group(group_id))
    }

    pub fn window_order(&self, window_id: i32) -> Vec<i32> {
        self.ids_matching(TabQuery::in_window(window_id))
    }

    pub fn moves(&self) -> Vec<(i32, i32)> {
        self.state.borrow().moves.clone()
    }

    pub fn group_calls(&self) -> Vec<(Vec<i32>, Option<i32>)> {
        self.state.borrow().group_calls.clone()
    }

    pub fn storage(&self) -> Value {
        Value::Object(self.state.borrow().storage.clone())
    }

    pub fn storage_writes(&self) -> usize {
        self.state.borrow().storage_writes
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }

    pub fn spawned_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Drive every spawned task, including ones spawned along the way, to completion
    pub fn run_spawned(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                block_on(task);
            }
        }
    }

    fn all_tabs(&self) -> Vec<TabInfo> {
        let state = self.state.borrow();
        state
            .windows
            .values()
            .flat_map(|(_, tabs)| {
                tabs.iter().enumerate().map(|(index, tab)| TabInfo {
                    index: index as i32,
                    ..tab.clone()
                })
            })
            .collect()
    }

    fn ids_matching(&self, query: TabQuery) -> Vec<i32> {
        self.all_tabs()
            .iter()
            .filter(|tab| query.matches(tab))
            .map(|tab| tab.id)
            .collect()
    }

    fn with_tab(&self, tab_id: i32, change: impl FnOnce(&mut TabInfo)) {
        let mut state = self.state.borrow_mut();
        let tab = state
            .windows
            .values_mut()
            .flat_map(|(_, tabs)| tabs.iter_mut())
            .find(|tab| tab.id == tab_id)
            .unwrap_or_else(|| panic!("no tab {tab_id}"));
        change(tab);
    }
}

impl TabsApi for FakeBrowser {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>> {
        if self.state.borrow().fail_tab_queries {
            return Err(Error::Host("tabs.query failed".to_string()));
        }
        Ok(self
            .all_tabs()
            .into_iter()
            .filter(|tab| query.matches(tab))
            .collect())
    }

    async fn query_groups(&self) -> Result<Vec<GroupInfo>> {
        let state = self.state.borrow();
        if state.fail_group_queries {
            return Err(Error::Host("tabGroups.query failed".to_string()));
        }
        Ok(state.groups.clone())
    }

    async fn get_group(&self, group_id: i32) -> Result<GroupInfo> {
        if self.state.borrow().fail_group_queries {
            return Err(Error::Host("tabGroups.get failed".to_string()));
        }
        self.group(group_id).ok_or(Error::NotFound {
            what: "group",
            id: group_id,
        })
    }

    async fn get_window(&self, window_id: i32) -> Result<WindowInfo> {
        let state = self.state.borrow();
        let (window_type, _) = state.windows.get(&window_id).ok_or(Error::NotFound {
            what: "window",
            id: window_id,
        })?;
        Ok(WindowInfo {
            id: window_id,
            window_type: *window_type,
        })
    }

    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failing_moves.contains(&tab_id) {
            return Err(Error::Host(format!("tabs.move({tab_id}) failed")));
        }

        let tabs = state
            .windows
            .values_mut()
            .map(|(_, tabs)| tabs)
            .find(|tabs| tabs.iter().any(|tab| tab.id == tab_id))
            .ok_or(Error::NotFound { what: "tab", id: tab_id })?;
        let from = tabs.iter().position(|tab| tab.id == tab_id).unwrap_or_default();
        let tab = tabs.remove(from);
        let to = (index.max(0) as usize).min(tabs.len());
        tabs.insert(to, tab);

        state.moves.push((tab_id, index));
        Ok(())
    }

    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32> {
        let mut state = self.state.borrow_mut();
        if state.fail_grouping {
            return Err(Error::Host("tabs.group failed".to_string()));
        }
        state.group_calls.push((tab_ids.to_vec(), group_id));

        let group_id = match group_id {
            Some(id) if state.groups.iter().any(|group| group.id == id) => id,
            Some(id) => return Err(Error::NotFound { what: "group", id }),
            None => {
                let id = state.next_group_id;
                state.next_group_id += 1;
                state.groups.push(GroupInfo {
                    id,
                    title: String::new(),
                    color: "grey".to_string(),
                    window_id: 1,
                });
                id
            }
        };

        for (_, tabs) in state.windows.values_mut() {
            for &tab_id in tab_ids {
                let Some(from) = tabs.iter().position(|tab| tab.id == tab_id) else {
                    continue;
                };
                // Joining a group moves the tab next to the group's other tabs
                let mut tab = tabs.remove(from);
                tab.group_id = group_id;
                let to = tabs
                    .iter()
                    .rposition(|t| t.group_id == group_id)
                    .map_or(from, |last| last + 1);
                tabs.insert(to, tab);
            }
        }

        Ok(group_id)
    }

    async fn update_group(&self, group_id: i32, update: GroupUpdate) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let group = state
            .groups
            .iter_mut()
            .find(|group| group.id == group_id)
            .ok_or(Error::NotFound { what: "group", id: group_id })?;
        if let Some(title) = update.title {
            group.title = title;
        }
        if let Some(color) = update.color {
            group.color = color;
        }
        Ok(())
    }
}

impl SettingsStore for FakeBrowser {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let state = self.state.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| state.storage.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.storage.extend(items);
        state.storage_writes += 1;
        Ok(())
    }
}

impl Runtime for FakeBrowser {
    async fn sleep(&self, delay: Duration) {
        let now = {
            let mut state = self.state.borrow_mut();
            state.elapsed += delay;
            state.sleeps.push(delay);
            state.elapsed
        };

        let due: Vec<Timer> = {
            let mut timers = self.timers.borrow_mut();
            let (due, pending) = timers.drain(..).partition(|(at, _)| *at <= now);
            *timers = pending;
            due
        };
        for (_, action) in due {
            action(self);
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.tasks.borrow_mut().push(task);
    }
}
