//! Fetch orchestration with a run-scoped credential refresh budget.
//!
//! Tasks execute strictly in input order. A response is classified as blocked
//! when the status is not 200 or the body matches a challenge signature. The
//! first blocked task in a run consumes the single refresh: the solver mints
//! a fresh token, it is persisted, and only that task is retried once. Every
//! later block is surfaced unrecovered. Transport errors never touch the
//! budget and never abort the queue.

use async_trait::async_trait;
use tracing::{info, warn};

use clearfetch_core::{
    ClearanceToken, FetchAttempt, FetchTask, HarvestError, TokenSnapshot, TokenStore,
};

use crate::block::is_challenge_page;
use crate::http::{PageFetcher, PageResponse};

/// Mints a fresh clearance token, e.g. by driving a browser solve against
/// the site root.
#[async_trait]
pub trait ClearanceRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(ClearanceToken, TokenSnapshot), HarvestError>;
}

/// Per-task result of a run.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: FetchTask,
    pub result: Result<FetchAttempt, HarvestError>,
    /// Whether this task consumed the run's refresh budget.
    pub refreshed: bool,
}

pub struct FetchOrchestrator<F, R> {
    fetcher: F,
    refresher: R,
    store: TokenStore,
    store_key: String,
}

impl<F: PageFetcher, R: ClearanceRefresher> FetchOrchestrator<F, R> {
    pub fn new(fetcher: F, refresher: R, store: TokenStore, store_key: String) -> Self {
        Self {
            fetcher,
            refresher,
            store,
            store_key,
        }
    }

    /// Execute the tasks in order with at most one refresh for the whole run.
    pub async fn run(&self, tasks: Vec<FetchTask>, mut token: ClearanceToken) -> Vec<TaskOutcome> {
        // Run-scoped state; a fresh orchestrator is constructed per run.
        let mut refreshed = false;
        let mut outcomes = Vec::with_capacity(tasks.len());

        for task in tasks {
            let outcome = match self.fetcher.fetch(&task.url, &token).await {
                Err(e) => {
                    // Transport failure: per-task, no refresh, keep going.
                    warn!(label = %task.label, error = %e, "fetch failed");
                    TaskOutcome {
                        task,
                        result: Err(e),
                        refreshed: false,
                    }
                }
                Ok(resp) => {
                    let attempt = classify(resp);
                    if attempt.blocked && !refreshed {
                        refreshed = true;
                        info!(label = %task.label, status = attempt.status, "blocked, refreshing clearance once for this run");
                        match self.refresh_token(&mut token).await {
                            Ok(()) => {
                                let retry = self.fetcher.fetch(&task.url, &token).await.map(classify);
                                if let Ok(attempt) = &retry {
                                    if attempt.blocked {
                                        warn!(label = %task.label, "still blocked after refresh");
                                    }
                                }
                                TaskOutcome {
                                    task,
                                    result: retry,
                                    refreshed: true,
                                }
                            }
                            Err(e) => {
                                warn!(label = %task.label, error = %e, "clearance refresh failed");
                                TaskOutcome {
                                    task,
                                    result: Err(e),
                                    refreshed: true,
                                }
                            }
                        }
                    } else {
                        if attempt.blocked {
                            warn!(label = %task.label, status = attempt.status, "blocked, refresh budget already spent");
                        }
                        TaskOutcome {
                            task,
                            result: Ok(attempt),
                            refreshed: false,
                        }
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn refresh_token(&self, token: &mut ClearanceToken) -> Result<(), HarvestError> {
        let (fresh, snapshot) = self.refresher.refresh().await?;
        self.store.append_and_save(&self.store_key, &snapshot)?;
        // Credential and client identity swap together, never separately.
        *token = fresh;
        Ok(())
    }
}

fn classify(resp: PageResponse) -> FetchAttempt {
    let blocked = resp.status != 200 || is_challenge_page(&resp.body);
    FetchAttempt {
        status: resp.status,
        body: resp.body,
        final_url: resp.final_url,
        blocked,
    }
}
