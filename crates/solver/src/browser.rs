use std::ffi::OsString;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, Tab};
use tracing::info;

use clearfetch_core::config::SolverConfig;
use clearfetch_core::{CookieRecord, HarvestError, ViewportPoint};

/// Narrow view of a live browser session. The challenge state machine only
/// needs these five operations, so the automation engine can be swapped (or
/// scripted in tests) without touching it.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), HarvestError>;
    async fn cookies(&self) -> Result<Vec<CookieRecord>, HarvestError>;
    async fn rendered_html(&self) -> Result<String, HarvestError>;
    async fn client_identity(&self) -> Result<String, HarvestError>;
    async fn simulate_challenge_interaction(&self, point: ViewportPoint) -> Result<(), HarvestError>;
}

pub struct HeadlessSession {
    // Keeps the Chrome process alive for the lifetime of the session.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl HeadlessSession {
    /// Launch a Chrome session with fixed window geometry. The interaction
    /// coordinate in the config is only meaningful relative to this geometry,
    /// so size and position are pinned at startup.
    pub fn launch(config: &SolverConfig) -> Result<Self, HarvestError> {
        let mut extra_args: Vec<OsString> = Vec::new();

        // Required for running in Docker containers
        extra_args.push(OsString::from("--no-sandbox"));
        extra_args.push(OsString::from("--disable-dev-shm-usage"));
        extra_args.push(OsString::from("--disable-gpu"));

        extra_args.push(OsString::from(format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        )));
        extra_args.push(OsString::from("--window-position=0,0"));

        if let Some(user_agent) = &config.user_agent {
            extra_args.push(OsString::from(format!("--user-agent={}", user_agent)));
        }

        let mut builder = headless_chrome::LaunchOptionsBuilder::default();
        builder
            .headless(!config.headed)
            .window_size(Some((config.window_width, config.window_height)))
            .args(extra_args.iter().map(|a| a.as_ref()).collect());

        // Use CHROME_PATH env var if set (for Docker/custom installs)
        if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
            builder.path(Some(std::path::PathBuf::from(chrome_path)));
        }

        let launch_options = builder
            .build()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        info!(headed = config.headed, "launching browser");
        let browser = Browser::new(launch_options).map_err(|e| HarvestError::Browser(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        Ok(Self { _browser: browser, tab })
    }
}

#[async_trait]
impl BrowserSession for HeadlessSession {
    async fn navigate(&self, url: &str) -> Result<(), HarvestError> {
        info!(url = %url, "navigating");

        self.tab
            .navigate_to(url)
            .map_err(|e| HarvestError::Browser(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, HarvestError> {
        let cookies = self
            .tab
            .get_cookies()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                // CDP reports expiry in seconds; records carry epoch millis.
                expires: c.expires * 1000.0,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn rendered_html(&self) -> Result<String, HarvestError> {
        self.tab
            .get_content()
            .map_err(|e| HarvestError::Browser(e.to_string()))
    }

    async fn client_identity(&self) -> Result<String, HarvestError> {
        let result = self
            .tab
            .evaluate("navigator.userAgent", false)
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| HarvestError::Browser("navigator.userAgent returned no value".to_string()))
    }

    async fn simulate_challenge_interaction(&self, point: ViewportPoint) -> Result<(), HarvestError> {
        // Full click sequence at the fixed viewport point. Assumes the
        // challenge widget sits at this location under the pinned geometry;
        // if it does not, the solve loop spins until its timeout.
        self.tab
            .evaluate(
                &format!(
                    r#"
                    ['mousedown', 'mouseup', 'click'].forEach((kind) => {{
                        const event = new MouseEvent(kind, {{
                            clientX: {x},
                            clientY: {y},
                            bubbles: true
                        }});
                        const target = document.elementFromPoint({x}, {y}) || document.body;
                        target.dispatchEvent(event);
                    }});
                    "#,
                    x = point.x,
                    y = point.y
                ),
                false,
            )
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        Ok(())
    }
}
