/// Settings snapshot read from chrome.storage.local
///
/// Loaded fresh for every event; nothing here is cached between events
/// because the options page may rewrite storage at any time.
use crate::domain::{DEFAULT_DOMAIN_LEVEL, clamp_max_level};
use crate::error::Result;
use crate::host::{SettingsStore, TabsApi};
use crate::resolver::{GroupRef, parse_group_id};
use crate::rules::Rule;
use crate::tab_data::{GroupInfo, SortMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_GROUP_ID_KEY: &str = "defaultGroupId";
pub const DEFAULT_GROUP_TITLE_KEY: &str = "defaultGroupTitle";
pub const GROUP_SORT_SETTINGS_KEY: &str = "groupSortSettings";
pub const SORT_METHOD_KEY: &str = "sortMethod";
pub const DOMAIN_SORT_MAX_LEVEL_KEY: &str = "domainSortMaxLevel";
pub const URL_RULES_KEY: &str = "urlRules";
pub const IGNORE_POPUP_KEY: &str = "ignorePopup";

pub const SETTINGS_KEYS: [&str; 7] = [
    DEFAULT_GROUP_ID_KEY,
    DEFAULT_GROUP_TITLE_KEY,
    GROUP_SORT_SETTINGS_KEY,
    SORT_METHOD_KEY,
    DOMAIN_SORT_MAX_LEVEL_KEY,
    URL_RULES_KEY,
    IGNORE_POPUP_KEY,
];

/// Per-group sort preferences as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSortSetting {
    #[serde(default)]
    pub auto_sort: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
}

/// Per-group sort preferences keyed by group title
///
/// Untitled groups are keyed by their id as a string. Records written by
/// older versions are keyed by id even when the group has a title;
/// `normalize` moves those over to the title key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSortSettings(BTreeMap<String, GroupSortSetting>);

impl GroupSortSettings {
    pub fn key_for(group: &GroupInfo) -> String {
        if group.title.is_empty() {
            group.id.to_string()
        } else {
            group.title.clone()
        }
    }

    pub fn insert(&mut self, key: &str, setting: GroupSortSetting) {
        self.0.insert(key.to_string(), setting);
    }

    /// Setting for `group`, title key first
    pub fn get(&self, group: &GroupInfo) -> Option<&GroupSortSetting> {
        self.0
            .get(&Self::key_for(group))
            .or_else(|| self.0.get(group.display_title()))
            .or_else(|| self.0.get(&group.id.to_string()))
    }

    /// Rewrite legacy id-keyed records to title keys; returns whether anything changed
    ///
    /// When both exist for one group the title-keyed record wins and the
    /// id-keyed one is dropped.
    pub fn normalize(&mut self, groups: &[GroupInfo]) -> bool {
        let mut changed = false;

        for group in groups.iter().filter(|g| !g.title.is_empty()) {
            let Some(legacy) = self.0.remove(&group.id.to_string()) else {
                continue;
            };
            changed = true;
            self.0.entry(group.title.clone()).or_insert(legacy);
        }

        changed
    }
}

/// Typed view of every setting the background worker reads
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_group: GroupRef,
    pub group_sort_settings: GroupSortSettings,
    /// Fallback sort method, kept raw so an unknown value stays visible
    pub sort_method: String,
    pub domain_sort_max_level: usize,
    pub url_rules: Vec<Rule>,
    pub ignore_popup: bool,
    /// Stored rules that could not be read and were left out of `url_rules`
    pub unreadable_rules: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_group: GroupRef::default(),
            group_sort_settings: GroupSortSettings::default(),
            sort_method: SortMethod::Domain.as_str().to_string(),
            domain_sort_max_level: DEFAULT_DOMAIN_LEVEL,
            url_rules: Vec::new(),
            ignore_popup: false,
            unreadable_rules: 0,
        }
    }
}

/// Sort behaviour that applies to one group
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSort {
    pub auto_sort: bool,
    pub sort_method: String,
}

impl Settings {
    /// Build settings from a storage snapshot; malformed entries fall back to defaults
    pub fn from_items(items: &Map<String, Value>) -> Settings {
        let defaults = Settings::default();

        let default_group = GroupRef::new(
            items.get(DEFAULT_GROUP_ID_KEY).and_then(parse_group_id),
            items.get(DEFAULT_GROUP_TITLE_KEY).and_then(Value::as_str),
        );

        let group_sort_settings = parse_entry(items, GROUP_SORT_SETTINGS_KEY).unwrap_or_default();
        let (url_rules, unreadable_rules) = parse_rules(items);

        let sort_method = items
            .get(SORT_METHOD_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(defaults.sort_method);

        Settings {
            default_group,
            group_sort_settings,
            sort_method,
            domain_sort_max_level: parse_max_level(items.get(DOMAIN_SORT_MAX_LEVEL_KEY)),
            url_rules,
            unreadable_rules,
            ignore_popup: items
                .get(IGNORE_POPUP_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.ignore_popup),
        }
    }

    /// Read settings and reconcile stored group references against live groups
    ///
    /// References that carry an id but no title get the group's current title,
    /// and legacy sort records are re-keyed. The store is only written back
    /// when one of those changed something.
    pub async fn load<H: SettingsStore + TabsApi>(host: &H) -> Result<Settings> {
        let items = host.get(&SETTINGS_KEYS).await?;
        let mut settings = Settings::from_items(&items);

        if !settings.needs_reconcile() {
            return Ok(settings);
        }

        let groups = match host.query_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                log::warn!("Skipping settings reconciliation: {}", e);
                return Ok(settings);
            }
        };
        let updates = settings.reconcile(&groups);
        if !updates.is_empty() {
            log::info!(
                "Backfilling stored group references: {:?}",
                updates.keys().collect::<Vec<_>>()
            );
            if let Err(e) = host.set(updates).await {
                log::warn!("Failed to save reconciled settings: {}", e);
            }
        }

        Ok(settings)
    }

    fn needs_reconcile(&self) -> bool {
        let untitled = |r: &GroupRef| r.id.is_some() && r.title.is_none();

        untitled(&self.default_group)
            || self.url_rules.iter().any(|rule| untitled(&rule.target))
            || self
                .group_sort_settings
                .0
                .keys()
                .any(|key| key.parse::<i32>().is_ok())
    }

    /// Apply reconciliation against `groups`, returning the storage items to write
    pub fn reconcile(&mut self, groups: &[GroupInfo]) -> Map<String, Value> {
        let mut updates = Map::new();

        if backfill_title(&mut self.default_group, groups) {
            if let Some(title) = &self.default_group.title {
                updates.insert(DEFAULT_GROUP_TITLE_KEY.to_string(), Value::from(title.clone()));
            }
        }

        let mut rules_changed = false;
        for rule in &mut self.url_rules {
            rules_changed |= backfill_title(&mut rule.target, groups);
        }
        if rules_changed && self.unreadable_rules > 0 {
            // Writing back would erase the rules that failed to parse
            log::warn!("Not saving backfilled rule titles: {} stored rules are unreadable", self.unreadable_rules);
        } else if rules_changed {
            if let Ok(rules) = serde_json::to_value(&self.url_rules) {
                updates.insert(URL_RULES_KEY.to_string(), rules);
            }
        }

        if self.group_sort_settings.normalize(groups) {
            if let Ok(sort_settings) = serde_json::to_value(&self.group_sort_settings) {
                updates.insert(GROUP_SORT_SETTINGS_KEY.to_string(), sort_settings);
            }
        }

        updates
    }

    /// Sort behaviour for `group`: its own setting, else the global method
    pub fn sort_for(&self, group: &GroupInfo) -> EffectiveSort {
        let setting = self.group_sort_settings.get(group);

        EffectiveSort {
            auto_sort: setting.is_some_and(|s| s.auto_sort),
            sort_method: setting
                .and_then(|s| s.sort_method.clone())
                .filter(|method| !method.is_empty())
                .unwrap_or_else(|| self.sort_method.clone()),
        }
    }
}

/// Fill in a missing title from the live group the id points at
fn backfill_title(group_ref: &mut GroupRef, groups: &[GroupInfo]) -> bool {
    if group_ref.title.is_some() {
        return false;
    }
    let Some(id) = group_ref.id else {
        return false;
    };

    match groups.iter().find(|g| g.id == id) {
        Some(group) => {
            *group_ref = GroupRef::capture(group);
            true
        }
        None => false,
    }
}

fn parse_entry<T: serde::de::DeserializeOwned>(items: &Map<String, Value>, key: &str) -> Option<T> {
    let value = items.get(key).filter(|v| !v.is_null())?;

    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring malformed '{}' setting: {}", key, e);
            None
        }
    }
}

/// Read `urlRules` entry by entry, so one bad rule does not disable the rest
///
/// Returns the readable rules in stored order and how many were dropped.
fn parse_rules(items: &Map<String, Value>) -> (Vec<Rule>, usize) {
    let Some(entries) = parse_entry::<Vec<Value>>(items, URL_RULES_KEY) else {
        return (Vec::new(), 0);
    };

    let mut rules = Vec::with_capacity(entries.len());
    let mut unreadable = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Rule>(entry) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                log::warn!("Ignoring unreadable URL rule #{}: {}", index, e);
                unreadable += 1;
            }
        }
    }

    (rules, unreadable)
}

/// Hierarchy depth for domainLevel sorting
///
/// Accepts numbers or numeric strings; missing, zero or garbage means the
/// default, anything else is clamped into range.
pub fn parse_max_level(value: Option<&Value>) -> usize {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.trunc() as i64),
        Some(Value::String(s)) => parse_leading_int(s),
        _ => None,
    };

    match raw {
        None | Some(0) => DEFAULT_DOMAIN_LEVEL,
        Some(n) if n < 0 => clamp_max_level(0),
        Some(n) => clamp_max_level(usize::try_from(n).unwrap_or(usize::MAX)),
    }
}

/// Integer prefix of a string, e.g. "6 levels" → 6
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let digits_end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);

    s[..digits_end].parse().ok()
}
