/// Reorders the tabs of one group in place
use crate::error::Result;
use crate::host::TabsApi;
use crate::operations::sorted_ids;
use crate::tab_data::{SortMethod, TabInfo, TabQuery};
use std::collections::BTreeMap;

/// Sort `group_id` by a stored method name, returning the number of moves issued
///
/// An unrecognized method leaves the group alone.
pub async fn sort_group<T: TabsApi>(
    tabs: &T,
    group_id: i32,
    method: &str,
    max_level: usize,
) -> Result<usize> {
    match method.parse::<SortMethod>() {
        Ok(method) => sort_group_by(tabs, group_id, method, max_level).await,
        Err(e) => {
            log::debug!("Leaving group {} unsorted: {}", group_id, e);
            Ok(0)
        }
    }
}

/// Sort `group_id`, one window at a time, returning the number of moves issued
///
/// Tab positions are per window, so a group spread over several windows is
/// sorted independently in each. Windows already in order are not touched.
pub async fn sort_group_by<T: TabsApi>(
    tabs: &T,
    group_id: i32,
    method: SortMethod,
    max_level: usize,
) -> Result<usize> {
    let group_tabs = tabs.query_tabs(TabQuery::in_group(group_id)).await?;
    if group_tabs.len() <= 1 {
        return Ok(0);
    }

    let mut tabs_by_window: BTreeMap<i32, Vec<TabInfo>> = BTreeMap::new();
    for tab in group_tabs {
        tabs_by_window.entry(tab.window_id).or_default().push(tab);
    }

    let mut moves = 0;
    for (window_id, window_tabs) in tabs_by_window {
        if window_tabs.len() <= 1 {
            continue;
        }

        let current_order: Vec<i32> = window_tabs.iter().map(|tab| tab.id).collect();
        let target_order = sorted_ids(&window_tabs, method, max_level);
        if current_order == target_order {
            continue;
        }

        let all_window_tabs = match tabs.query_tabs(TabQuery::in_window(window_id)).await {
            Ok(all) => all,
            Err(e) => {
                log::warn!("Failed to list tabs of window {}: {}", window_id, e);
                continue;
            }
        };
        let Some(group_start) = all_window_tabs
            .iter()
            .position(|tab| tab.id == current_order[0])
        else {
            log::warn!("Group {} lost its first tab in window {}", group_id, window_id);
            continue;
        };

        // Back to front, so each move leaves the not-yet-placed tabs where they were
        for (offset, &tab_id) in target_order.iter().enumerate().rev() {
            let index = (group_start + offset) as i32;
            moves += 1;
            if let Err(e) = tabs.move_tab(tab_id, index).await {
                log::warn!("Failed to move tab {} to index {}: {}", tab_id, index, e);
            }
        }
        log::info!("Sorted group {} in window {} by {}", group_id, window_id, method);
    }

    Ok(moves)
}
