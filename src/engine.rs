/// Decides where tabs go when they are created or navigate
///
/// Each event is handled on its own: settings are read fresh, every failure
/// is logged and swallowed, and sorting is handed off to detached tasks so
/// the event returns without waiting for it. There is no locking between
/// concurrent events; the "already in target group" check and the sorter's
/// "order unchanged" check make repeated or interleaved work harmless.
use crate::error::{Error, Result};
use crate::host::Host;
use crate::resolver::GroupRef;
use crate::rules::{RuleFilter, matching_rules};
use crate::scheduler::{RetryPolicy, spawn_delayed_sort, spawn_group_sort};
use crate::sorter::sort_group;
use crate::storage::{EffectiveSort, Settings};
use crate::tab_data::{GroupUpdate, TAB_GROUP_ID_NONE, TabInfo, TabQuery, is_loaded_url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

/// Which tab events only apply rules that have `autoMove` set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoMoveScope {
    /// Creation and URL-change events both skip rules without `autoMove`
    #[default]
    AllEvents,
    /// Only creation events do; URL changes apply any matching rule
    CreationOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrouperOptions {
    pub auto_move_scope: AutoMoveScope,
    pub retry: RetryPolicy,
    /// Wait before re-sorting a group after one of its tabs navigated
    pub url_change_sort_delay: Duration,
    /// Wait before sorting groups that received tabs from "apply rules"
    pub apply_rules_sort_delay: Duration,
}

impl Default for GrouperOptions {
    fn default() -> Self {
        GrouperOptions {
            auto_move_scope: AutoMoveScope::default(),
            retry: RetryPolicy::default(),
            url_change_sort_delay: Duration::from_millis(300),
            apply_rules_sort_delay: Duration::from_millis(300),
        }
    }
}

/// What a tab event was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEvent {
    Created,
    UrlChanged,
}

/// The fields of `chrome.tabs.onUpdated`'s changeInfo we react to
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub group_id: Option<i32>,
}

/// What happened to a tab, mostly for tests and logs
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// URL not loaded yet; a later URL-change event will handle it
    Deferred,
    Pinned,
    IgnoredWindow,
    /// A rule matched and the tab is already in that group
    AlreadyInRuleGroup(i32),
    MovedByRule(i32),
    /// A rule matched a closed group, so one was created with the rule's title
    NewGroupForRule(i32),
    /// The user put the tab in a group themselves
    KeptUserGroup(i32),
    MovedToDefault(i32),
    Untouched,
}

/// Requests sent from the popup and options pages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    SortAllTabs {
        #[serde(default)]
        sort_method: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SortGroup { group_id: i32, sort_method: String },
    #[serde(rename_all = "camelCase")]
    ApplyRules {
        #[serde(default)]
        force_move: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
}

impl Response {
    pub fn ok() -> Response {
        Response {
            success: true,
            ..Response::default()
        }
    }

    pub fn failed(error: impl ToString) -> Response {
        Response {
            success: false,
            error: Some(error.to_string()),
            updated: None,
        }
    }
}

pub struct TabGrouper<H> {
    host: Rc<H>,
    options: GrouperOptions,
}

impl<H> Clone for TabGrouper<H> {
    fn clone(&self) -> Self {
        TabGrouper {
            host: Rc::clone(&self.host),
            options: self.options,
        }
    }
}

impl<H: Host + 'static> TabGrouper<H> {
    pub fn new(host: Rc<H>, options: GrouperOptions) -> TabGrouper<H> {
        TabGrouper { host, options }
    }

    /// `chrome.tabs.onCreated`
    pub async fn on_tab_created(&self, tab: &TabInfo) -> Placement {
        self.group_tab(tab, TabEvent::Created).await
    }

    /// `chrome.tabs.onUpdated`
    pub async fn on_tab_updated(&self, tab: &TabInfo, change: &TabChange) {
        if let Some(url) = &change.url {
            self.group_tab(tab, TabEvent::UrlChanged).await;

            // A grouped tab that just got a real URL may now be out of order
            if tab.is_grouped() && is_loaded_url(url) {
                if let Some(sort) = self.auto_sort_for(tab.group_id).await {
                    spawn_delayed_sort(
                        &self.host,
                        tab.group_id,
                        sort.sort_method,
                        sort.max_level,
                        self.options.url_change_sort_delay,
                    );
                }
            }
        }

        if change.group_id.is_some() && tab.is_grouped() {
            if let Some(sort) = self.auto_sort_for(tab.group_id).await {
                spawn_group_sort(
                    &self.host,
                    tab.group_id,
                    sort.sort_method,
                    sort.max_level,
                    self.options.retry,
                );
            }
        }
    }

    /// Put `tab` where the rules or the default group say; never fails
    pub async fn group_tab(&self, tab: &TabInfo, event: TabEvent) -> Placement {
        match self.try_group_tab(tab, event).await {
            Ok(placement) => {
                log::debug!("Tab {} ({:?}): {:?}", tab.id, event, placement);
                placement
            }
            Err(e) => {
                log::warn!("Failed to group tab {}: {}", tab.id, e);
                Placement::Untouched
            }
        }
    }

    async fn try_group_tab(&self, tab: &TabInfo, event: TabEvent) -> Result<Placement> {
        if !tab.has_loaded_url() {
            return Ok(Placement::Deferred);
        }
        if tab.pinned {
            return Ok(Placement::Pinned);
        }

        let settings = Settings::load(&*self.host).await?;

        if settings.ignore_popup {
            let window = self.host.get_window(tab.window_id).await?;
            if !window.is_normal() {
                log::debug!("Tab {} is in a {:?} window, not grouping", tab.id, window.window_type);
                return Ok(Placement::IgnoredWindow);
            }
        }

        if let Some(placement) = self.apply_rules(tab, event, &settings).await {
            return Ok(placement);
        }

        // Opened from a group's "+" button: the user already chose
        if tab.is_grouped() {
            return Ok(Placement::KeptUserGroup(tab.group_id));
        }

        let Some(default_group) = settings.default_group.resolve(&*self.host).await else {
            return Ok(Placement::Untouched);
        };
        self.host.group_tabs(&[tab.id], Some(default_group)).await?;
        log::info!("Moved tab {} to default group {}", tab.id, default_group);
        self.schedule_auto_sort(default_group, &settings).await;

        Ok(Placement::MovedToDefault(default_group))
    }

    /// Try each matching rule in order until one places the tab
    async fn apply_rules(&self, tab: &TabInfo, event: TabEvent, settings: &Settings) -> Option<Placement> {
        let filter = match (event, self.options.auto_move_scope) {
            (TabEvent::UrlChanged, AutoMoveScope::CreationOnly) => RuleFilter::All,
            _ => RuleFilter::AutoMoveOnly,
        };

        for rule in matching_rules(&tab.url, &settings.url_rules, filter) {
            log::debug!("Rule '{}' matches {}", rule.pattern, tab.url);

            match self.place_by_rule(tab, &rule.target, settings).await {
                Ok(placement) => return Some(placement),
                Err(e) => log::warn!("Failed to apply rule '{}' to tab {}: {}", rule.pattern, tab.id, e),
            }
        }

        None
    }

    async fn place_by_rule(&self, tab: &TabInfo, target: &GroupRef, settings: &Settings) -> Result<Placement> {
        let Some(group_id) = target.resolve(&*self.host).await else {
            let title = target
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .ok_or(Error::NotFound { what: "rule group", id: target.id.unwrap_or(TAB_GROUP_ID_NONE) })?;

            let group_id = self.host.group_tabs(&[tab.id], None).await?;
            let update = GroupUpdate {
                title: Some(title.to_string()),
                color: None,
            };
            self.host.update_group(group_id, update).await?;
            log::info!("Created group '{}' ({}) for tab {}", title, group_id, tab.id);

            self.schedule_auto_sort(group_id, settings).await;
            return Ok(Placement::NewGroupForRule(group_id));
        };

        if tab.group_id == group_id {
            return Ok(Placement::AlreadyInRuleGroup(group_id));
        }

        self.host.group_tabs(&[tab.id], Some(group_id)).await?;
        log::info!("Moved tab {} to rule group {}", tab.id, group_id);
        self.schedule_auto_sort(group_id, settings).await;

        Ok(Placement::MovedByRule(group_id))
    }

    async fn schedule_auto_sort(&self, group_id: i32, settings: &Settings) {
        if let Some(sort) = self.auto_sort_with(group_id, settings).await {
            spawn_group_sort(&self.host, group_id, sort.sort_method, sort.max_level, self.options.retry);
        }
    }

    /// Sort method for `group_id` if that group auto-sorts, reading settings fresh
    async fn auto_sort_for(&self, group_id: i32) -> Option<GroupSortPlan> {
        match Settings::load(&*self.host).await {
            Ok(settings) => self.auto_sort_with(group_id, &settings).await,
            Err(e) => {
                log::warn!("Failed to read sort settings for group {}: {}", group_id, e);
                None
            }
        }
    }

    async fn auto_sort_with(&self, group_id: i32, settings: &Settings) -> Option<GroupSortPlan> {
        let group = match self.host.get_group(group_id).await {
            Ok(group) => group,
            Err(e) => {
                log::debug!("No sort settings for group {}: {}", group_id, e);
                return None;
            }
        };

        let EffectiveSort { auto_sort, sort_method } = settings.sort_for(&group);
        auto_sort.then_some(GroupSortPlan {
            sort_method,
            max_level: settings.domain_sort_max_level,
        })
    }

    /// Sort every group, each by its own method, else `sort_method`, else the global default
    pub async fn sort_all_tabs(&self, sort_method: Option<&str>) -> Result<()> {
        let settings = Settings::load(&*self.host).await?;
        let groups = self.host.query_groups().await?;

        for group in &groups {
            let method = settings
                .group_sort_settings
                .get(group)
                .and_then(|s| s.sort_method.as_deref())
                .filter(|m| !m.is_empty())
                .or(sort_method.filter(|m| !m.is_empty()))
                .unwrap_or(settings.sort_method.as_str());

            if let Err(e) = sort_group(&*self.host, group.id, method, settings.domain_sort_max_level).await {
                log::warn!("Failed to sort group '{}': {}", group.display_title(), e);
            }
        }

        Ok(())
    }

    /// Sort one group right now
    pub async fn sort_group(&self, group_id: i32, sort_method: &str) -> Result<usize> {
        let settings = Settings::load(&*self.host).await?;
        sort_group(&*self.host, group_id, sort_method, settings.domain_sort_max_level).await
    }

    /// Apply the rules to every open tab, ignoring `autoMove`
    ///
    /// Tabs already in a group are only moved with `force_move`. Groups that
    /// received tabs and auto-sort are sorted shortly afterwards. Returns the
    /// number of tabs moved.
    pub async fn apply_rules_to_all_tabs(&self, force_move: bool) -> Result<usize> {
        let settings = Settings::load(&*self.host).await?;
        let tabs = self.host.query_tabs(TabQuery::all()).await?;

        let mut updated = 0;
        let mut touched_groups = BTreeSet::new();
        for tab in tabs.iter().filter(|tab| !tab.pinned) {
            if let Some(group_id) = self.apply_first_live_rule(tab, force_move, &settings).await {
                updated += 1;
                touched_groups.insert(group_id);
            }
        }

        for group_id in touched_groups {
            if let Some(sort) = self.auto_sort_with(group_id, &settings).await {
                spawn_delayed_sort(
                    &self.host,
                    group_id,
                    sort.sort_method,
                    sort.max_level,
                    self.options.apply_rules_sort_delay,
                );
            }
        }

        log::info!("Applied rules to {} tabs", updated);
        Ok(updated)
    }

    /// Move `tab` by the first matching rule whose group is live; returns the group it joined
    ///
    /// Rules pointing at no live group are passed over. A grouped tab stops
    /// at its first matching rule unless `force_move` is set.
    async fn apply_first_live_rule(&self, tab: &TabInfo, force_move: bool, settings: &Settings) -> Option<i32> {
        for rule in matching_rules(&tab.url, &settings.url_rules, RuleFilter::All) {
            if !force_move && tab.is_grouped() {
                return None;
            }
            let Some(group_id) = rule.target.resolve(&*self.host).await else {
                log::debug!("Rule '{}' points at no live group", rule.pattern);
                continue;
            };
            if tab.group_id == group_id {
                return None;
            }

            match self.host.group_tabs(&[tab.id], Some(group_id)).await {
                Ok(_) => return Some(group_id),
                Err(e) => log::warn!("Failed to apply rule '{}' to tab {}: {}", rule.pattern, tab.id, e),
            }
        }

        None
    }

    /// Answer a runtime message from the popup or options page
    pub async fn handle_request(&self, request: Request) -> Response {
        let result = match request {
            Request::SortAllTabs { sort_method } => self
                .sort_all_tabs(sort_method.as_deref())
                .await
                .map(|_| Response::ok()),
            Request::SortGroup { group_id, sort_method } => self
                .sort_group(group_id, &sort_method)
                .await
                .map(|_| Response::ok()),
            Request::ApplyRules { force_move } => {
                self.apply_rules_to_all_tabs(force_move)
                    .await
                    .map(|updated| Response {
                        updated: Some(updated),
                        ..Response::ok()
                    })
            }
        };

        result.unwrap_or_else(|e| {
            log::error!("Request failed: {}", e);
            Response::failed(e)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GroupSortPlan {
    sort_method: String,
    max_level: usize,
}
