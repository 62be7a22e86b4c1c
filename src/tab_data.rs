/// Data structures shared with the browser's tabs, tabGroups and windows APIs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Group id the browser reports for tabs that are not in any group
pub const TAB_GROUP_ID_NONE: i32 = -1;

/// Title used for a group whose title is empty
pub const UNNAMED_GROUP_TITLE: &str = "Unnamed group";

/// URLs a freshly opened tab shows before it navigates anywhere
pub const NEW_TAB_URLS: [&str; 3] = ["chrome://newtab/", "about:newtab", "edge://newtab/"];

/// Information about a browser tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "ungrouped")]
    pub group_id: i32,
    pub window_id: i32,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub index: i32,
}

fn ungrouped() -> i32 {
    TAB_GROUP_ID_NONE
}

impl TabInfo {
    pub fn new(id: i32, window_id: i32, url: &str, title: &str) -> TabInfo {
        TabInfo {
            id,
            url: url.to_string(),
            title: title.to_string(),
            group_id: TAB_GROUP_ID_NONE,
            window_id,
            pinned: false,
            index: 0,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id != TAB_GROUP_ID_NONE
    }

    /// Whether the tab has navigated to a real page yet
    pub fn has_loaded_url(&self) -> bool {
        is_loaded_url(&self.url)
    }
}

/// False for empty URLs and new-tab placeholders
pub fn is_loaded_url(url: &str) -> bool {
    !url.is_empty() && !NEW_TAB_URLS.contains(&url)
}

/// A tab group as reported by the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub window_id: i32,
}

impl GroupInfo {
    /// The title shown to the user, with the placeholder for untitled groups
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            UNNAMED_GROUP_TITLE
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowType {
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: i32,
    #[serde(rename = "type")]
    pub window_type: WindowType,
}

impl WindowInfo {
    pub fn is_normal(&self) -> bool {
        self.window_type == WindowType::Normal
    }
}

/// Filter for tab queries; unset fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i32>,
}

impl TabQuery {
    pub fn all() -> TabQuery {
        TabQuery::default()
    }

    pub fn in_group(group_id: i32) -> TabQuery {
        TabQuery {
            group_id: Some(group_id),
            ..TabQuery::default()
        }
    }

    pub fn in_window(window_id: i32) -> TabQuery {
        TabQuery {
            window_id: Some(window_id),
            ..TabQuery::default()
        }
    }

    pub fn matches(&self, tab: &TabInfo) -> bool {
        self.group_id.is_none_or(|id| tab.group_id == id)
            && self.window_id.is_none_or(|id| tab.window_id == id)
    }
}

/// Properties to change on a group
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Named ordering strategy for the tabs of one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMethod {
    Domain,
    SecondLevelDomain,
    DomainLevel,
    Url,
    Title,
    Created,
}

impl SortMethod {
    pub const ALL: [SortMethod; 6] = [
        SortMethod::Domain,
        SortMethod::SecondLevelDomain,
        SortMethod::DomainLevel,
        SortMethod::Url,
        SortMethod::Title,
        SortMethod::Created,
    ];

    /// The identifier used in storage and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMethod::Domain => "domain",
            SortMethod::SecondLevelDomain => "domain2",
            SortMethod::DomainLevel => "domainLevel",
            SortMethod::Url => "url",
            SortMethod::Title => "title",
            SortMethod::Created => "created",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMethod::Domain => "By domain",
            SortMethod::SecondLevelDomain => "By second-level domain",
            SortMethod::DomainLevel => "By domain hierarchy",
            SortMethod::Url => "By URL",
            SortMethod::Title => "By title",
            SortMethod::Created => "By creation order",
        }
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| format!("unrecognized sort method '{}'", s))
    }
}
