/// Durable references to tab groups
///
/// Group ids die with the browser session while user-assigned titles
/// survive a restart, so every stored reference carries both and is resolved
/// here: id first, then title among the live groups.
use crate::host::TabsApi;
use crate::tab_data::GroupInfo;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(
        rename = "groupId",
        default,
        deserialize_with = "deserialize_group_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i32>,
    #[serde(
        rename = "groupTitle",
        default,
        deserialize_with = "deserialize_group_title",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
}

impl GroupRef {
    pub fn new(id: Option<i32>, title: Option<&str>) -> GroupRef {
        GroupRef {
            id,
            title: title.and_then(non_empty),
        }
    }

    /// Reference to `group` as it is right now, title included
    pub fn capture(group: &GroupInfo) -> GroupRef {
        GroupRef {
            id: Some(group.id),
            title: Some(group.display_title().to_string()),
        }
    }

    /// Find the live group this reference points at
    ///
    /// Never fails: any lookup error degrades to `None`.
    pub async fn resolve<T: TabsApi>(&self, tabs: &T) -> Option<i32> {
        if let Some(id) = self.id {
            match tabs.get_group(id).await {
                Ok(group) => return Some(group.id),
                Err(e) => log::debug!("Group {} is gone ({}), trying title", id, e),
            }
        }

        let title = self.title.as_deref()?;
        match tabs.query_groups().await {
            Ok(groups) => find_by_title(&groups, title).map(|group| group.id),
            Err(e) => {
                log::warn!("Failed to list groups while resolving '{}': {}", title, e);
                None
            }
        }
    }
}

/// Live group whose displayed title equals `title`
pub fn find_by_title<'a>(groups: &'a [GroupInfo], title: &str) -> Option<&'a GroupInfo> {
    groups.iter().find(|group| group.display_title() == title)
}

/// Titles are kept verbatim so they compare equal to the live group's title
fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Parse a stored group id: numbers, numeric strings, or nothing
///
/// Older settings pages stored the raw `<select>` value, so "12" is as valid
/// as 12, and values coming through JS may be floats like 12.0; null and ""
/// mean no id.
pub fn parse_group_id(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn deserialize_group_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_group_id))
}

fn deserialize_group_title<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_empty))
}
