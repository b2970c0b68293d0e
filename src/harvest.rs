use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};
use url::Url;

use clearfetch_client::{ClearanceRefresher, FetchOrchestrator, HttpFetcher, TaskOutcome};
use clearfetch_core::config::SolverConfig;
use clearfetch_core::{
    AppConfig, ClearanceToken, FetchAttempt, FetchTask, HarvestError, ListingRecord,
    TokenSnapshot, TokenStore,
};
use clearfetch_parser::extract_listings;
use clearfetch_solver::{random_chrome_user_agent, ChallengeSolver, HeadlessSession};

/// Drive one full browser solve against `url` and hand back the captured
/// token with its persistable snapshot. A fresh browser session per mint.
pub async fn mint_token(
    config: &SolverConfig,
    url: &str,
) -> Result<(ClearanceToken, TokenSnapshot), HarvestError> {
    let mut config = config.clone();
    if config.user_agent.is_none() {
        config.user_agent = Some(random_chrome_user_agent().to_string());
    }

    let session = HeadlessSession::launch(&config)?;
    let solver = ChallengeSolver::new(
        session,
        config.interaction_point(),
        Duration::from_secs(config.timeout_seconds),
    );

    let outcome = solver.solve(url).await?;
    if let Some(kind) = outcome.challenge {
        info!(kind = kind.label(), "challenge solved");
    }
    info!(
        platform = %outcome.profile.platform,
        browser = %outcome.profile.browser_version,
        mobile = outcome.profile.mobile,
        "captured client identity profile"
    );

    Ok((outcome.token, outcome.snapshot))
}

/// Solver-backed refresher used by the orchestrator's single in-run refresh.
struct SolverRefresher {
    solver_config: SolverConfig,
    url: String,
}

#[async_trait]
impl ClearanceRefresher for SolverRefresher {
    async fn refresh(&self) -> Result<(ClearanceToken, TokenSnapshot), HarvestError> {
        mint_token(&self.solver_config, &self.url).await
    }
}

pub async fn run_harvest(mut config: AppConfig, headed: bool, fresh: bool) -> Result<()> {
    if headed {
        config.solver.headed = true;
    }

    let store = TokenStore::new(&config.tokens.file);
    let root_url = config.site.root_url.clone();

    // Load the cached token, or mint the first one. Failing to obtain any
    // token aborts the run before a single fetch happens.
    let cached = if fresh {
        None
    } else {
        match store.load(&config.site.domain_hint) {
            Ok(token) => {
                info!(domain = %token.domain, "using cached clearance token");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "no cached clearance token, solving first");
                None
            }
        }
    };
    let token = match cached {
        Some(token) => token,
        None => {
            let (token, snapshot) = mint_token(&config.solver, &root_url).await?;
            store.append_and_save(&root_url, &snapshot)?;
            token
        }
    };

    let tasks = config
        .site
        .targets
        .iter()
        .map(|t| {
            Ok(FetchTask {
                label: t.label.clone(),
                url: Url::parse(&t.url)
                    .map_err(|e| HarvestError::Config(format!("{}: {}", t.url, e)))?,
            })
        })
        .collect::<Result<Vec<_>, HarvestError>>()?;

    let fetcher = HttpFetcher::new(
        root_url.clone(),
        config.site.locale.clone(),
        config.fetch.timeout_seconds,
    )?;
    let refresher = SolverRefresher {
        solver_config: config.solver.clone(),
        url: root_url.clone(),
    };
    let orchestrator = FetchOrchestrator::new(fetcher, refresher, store, root_url);

    let outcomes = orchestrator.run(tasks, token).await;

    let output_dir = Path::new(&config.fetch.output_dir);
    std::fs::create_dir_all(output_dir)?;

    // Report per task; one failed task never aborts the rest.
    for outcome in &outcomes {
        match &outcome.result {
            Err(e) => error!(label = %outcome.task.label, error = %e, "task failed"),
            Ok(attempt) if attempt.blocked => {
                error!(label = %outcome.task.label, status = attempt.status, "task still blocked")
            }
            Ok(attempt) => {
                info!(
                    label = %outcome.task.label,
                    status = attempt.status,
                    final_url = %attempt.final_url,
                    bytes = attempt.body.len(),
                    "page fetched"
                );
                if let Err(e) = write_artifacts(output_dir, &config, outcome, attempt) {
                    error!(label = %outcome.task.label, error = %e, "failed to write artifacts");
                }
            }
        }
    }

    Ok(())
}

fn write_artifacts(
    dir: &Path,
    config: &AppConfig,
    outcome: &TaskOutcome,
    attempt: &FetchAttempt,
) -> Result<()> {
    let label = &outcome.task.label;

    let html_path = dir.join(format!("listing_{label}.html"));
    std::fs::write(&html_path, &attempt.body)?;

    let records = extract_listings(&attempt.body);
    info!(label = %label, records = records.len(), "extracted listing records");

    let json_path = dir.join(format!("listing_{label}.json"));
    std::fs::write(&json_path, serde_json::to_string_pretty(&records)?)?;

    let filter = config
        .site
        .targets
        .iter()
        .find(|t| &t.label == label)
        .and_then(|t| t.filter_category.as_deref());
    if let Some(filter) = filter {
        let filtered: Vec<&ListingRecord> =
            records.iter().filter(|r| r.category == filter).collect();
        let filtered_path = dir.join(format!("listing_{label}_{filter}.json"));
        std::fs::write(&filtered_path, serde_json::to_string_pretty(&filtered)?)?;
        info!(label = %label, filter = %filter, records = filtered.len(), "wrote filtered records");
    }

    Ok(())
}
