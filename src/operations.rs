/// Tab orderings for each sort method
///
/// Every method is a total order: tabs missing the relevant field (URL or
/// title) go last, equal keys fall back to ascending tab id, so newer tabs
/// land after older ones with the same key. Text keys compare by byte
/// order, not locale collation, so accented letters sort after `z`.
use crate::domain::{domain, domain_levels, second_level_domain};
use crate::tab_data::{SortMethod, TabInfo};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Text(String),
    Levels(Vec<String>),
    Creation,
}

/// Key for `tab`, or `None` when the field the method looks at is empty
fn sort_key(tab: &TabInfo, method: SortMethod, max_level: usize) -> Option<SortKey> {
    let url = tab.url.as_str();

    match method {
        SortMethod::Created => Some(SortKey::Creation),
        SortMethod::Title if tab.title.is_empty() => None,
        SortMethod::Title => Some(SortKey::Text(tab.title.to_lowercase())),
        _ if url.is_empty() => None,
        SortMethod::Domain => Some(SortKey::Text(domain(url))),
        SortMethod::SecondLevelDomain => Some(SortKey::Text(second_level_domain(url))),
        SortMethod::DomainLevel => Some(SortKey::Levels(domain_levels(url, max_level))),
        SortMethod::Url => Some(SortKey::Text(url.to_lowercase())),
    }
}

/// Sort tabs by `method` (precompute the key for each tab)
///
/// `max_level` only matters for `SortMethod::DomainLevel` and must already be
/// clamped by the caller.
pub fn sort_tabs(tabs: &[TabInfo], method: SortMethod, max_level: usize) -> Vec<TabInfo> {
    let mut tabs_with_key: Vec<(bool, Option<SortKey>, i32, &TabInfo)> = tabs
        .iter()
        .map(|tab| {
            let key = sort_key(tab, method, max_level);
            (key.is_none(), key, tab.id, tab)
        })
        .collect();

    // Present keys first, then by key, then by id
    tabs_with_key.sort_by(|a, b| (a.0, &a.1, a.2).cmp(&(b.0, &b.1, b.2)));

    tabs_with_key
        .into_iter()
        .map(|(_, _, _, tab)| tab.clone())
        .collect()
}

/// Ids of `tabs` in the order `method` puts them
pub fn sorted_ids(tabs: &[TabInfo], method: SortMethod, max_level: usize) -> Vec<i32> {
    sort_tabs(tabs, method, max_level)
        .iter()
        .map(|tab| tab.id)
        .collect()
}
