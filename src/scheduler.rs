/// Deferred sorting for groups whose tabs are still loading
///
/// A tab that was just created usually has no URL or title yet, so sorting
/// right away would put it at the end for the wrong reason. Sorts are
/// therefore run as detached tasks that wait, sort, and try again while any
/// tab in the group is still blank.
use crate::error::Error;
use crate::host::{Runtime, TabsApi};
use crate::sorter::sort_group;
use crate::tab_data::TabQuery;
use futures::FutureExt;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait before the first attempt, long enough for a new tab to start loading
    pub first_delay: Duration,
    pub base_delay: Duration,
    /// Added to `base_delay` once per attempt after the first
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            first_delay: Duration::from_millis(500),
            base_delay: Duration::from_millis(200),
            step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.first_delay
        } else {
            self.base_delay + self.step * attempt
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// Sorted with every tab showing a real URL
    Settled { attempts: u32 },
    /// Sorted, but some tabs were still blank when attempts ran out
    Unsettled { attempts: u32 },
    /// The group never had two tabs to order
    TooFewTabs { attempts: u32 },
    /// The last attempt failed
    Failed { attempts: u32, error: Error },
}

/// Sort a group with retries; never fails, the outcome is only for logging
pub async fn trigger_group_sort<H: TabsApi + Runtime>(
    host: &H,
    group_id: i32,
    method: &str,
    max_level: usize,
    policy: &RetryPolicy,
) -> RetryOutcome {
    let mut outcome = RetryOutcome::TooFewTabs { attempts: 0 };

    for attempt in 0..policy.attempts {
        host.sleep(policy.delay_before(attempt)).await;
        let attempts = attempt + 1;
        log::debug!("Sort attempt {}/{} for group {}", attempts, policy.attempts, group_id);

        match sort_attempt(host, group_id, method, max_level).await {
            Ok(None) => outcome = RetryOutcome::TooFewTabs { attempts },
            Ok(Some(true)) => return RetryOutcome::Settled { attempts },
            Ok(Some(false)) => outcome = RetryOutcome::Unsettled { attempts },
            Err(error) => {
                log::warn!(
                    "Sort attempt {}/{} for group {} failed: {}",
                    attempts,
                    policy.attempts,
                    group_id,
                    error
                );
                outcome = RetryOutcome::Failed { attempts, error };
            }
        }
    }

    match &outcome {
        RetryOutcome::Unsettled { attempts } => log::warn!(
            "{}",
            Error::ExhaustedRetry {
                group_id,
                attempts: *attempts
            }
        ),
        RetryOutcome::Failed { error, .. } => {
            log::error!("Giving up sorting group {}: {}", group_id, error)
        }
        _ => {}
    }

    outcome
}

/// One pass: `None` if there is nothing to sort, else whether every tab had loaded
async fn sort_attempt<T: TabsApi>(
    tabs: &T,
    group_id: i32,
    method: &str,
    max_level: usize,
) -> crate::error::Result<Option<bool>> {
    let group_tabs = tabs.query_tabs(TabQuery::in_group(group_id)).await?;
    if group_tabs.len() < 2 {
        return Ok(None);
    }

    sort_group(tabs, group_id, method, max_level).await?;

    Ok(Some(group_tabs.iter().all(|tab| tab.has_loaded_url())))
}

/// Start `trigger_group_sort` as a detached task
pub fn spawn_group_sort<H: TabsApi + Runtime + 'static>(
    host: &Rc<H>,
    group_id: i32,
    method: String,
    max_level: usize,
    policy: RetryPolicy,
) {
    let task_host = Rc::clone(host);
    host.spawn(
        async move {
            let outcome =
                trigger_group_sort(&*task_host, group_id, &method, max_level, &policy).await;
            log::debug!("Sort of group {} finished: {:?}", group_id, outcome);
        }
        .boxed_local(),
    );
}

/// Sort a group once after `delay`, as a detached task
pub fn spawn_delayed_sort<H: TabsApi + Runtime + 'static>(
    host: &Rc<H>,
    group_id: i32,
    method: String,
    max_level: usize,
    delay: Duration,
) {
    let task_host = Rc::clone(host);
    host.spawn(
        async move {
            task_host.sleep(delay).await;
            if let Err(e) = sort_group(&*task_host, group_id, &method, max_level).await {
                log::warn!("Delayed sort of group {} failed: {}", group_id, e);
            }
        }
        .boxed_local(),
    );
}
