use serde::Deserialize;

use crate::types::ViewportPoint;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub site: SiteConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub root_url: String,
    pub domain_hint: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub label: String,
    pub url: String,
    /// When set, rows with exactly this category are exported separately.
    #[serde(default)]
    pub filter_category: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    #[serde(default = "default_token_file")]
    pub file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolverConfig {
    #[serde(default = "default_solve_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_headed")]
    pub headed: bool,
    /// Viewport coordinate clicked once per second while solving. Only
    /// meaningful under the fixed window geometry below.
    #[serde(default = "default_interaction_x")]
    pub interaction_x: f64,
    #[serde(default = "default_interaction_y")]
    pub interaction_y: f64,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Pinned user agent; a recent Chrome one is picked when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchSettings {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl SolverConfig {
    pub fn interaction_point(&self) -> ViewportPoint {
        ViewportPoint {
            x: self.interaction_x,
            y: self.interaction_y,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            file: default_token_file(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_solve_timeout(),
            headed: default_headed(),
            interaction_x: default_interaction_x(),
            interaction_y: default_interaction_y(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_locale() -> String {
    "zh-CN,zh;q=0.9".to_string()
}

fn default_token_file() -> String {
    "clearance_tokens.json".to_string()
}

fn default_solve_timeout() -> u64 {
    30
}

fn default_headed() -> bool {
    true
}

fn default_interaction_x() -> f64 {
    532.0
}

fn default_interaction_y() -> f64 {
    375.0
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_output_dir() -> String {
    "data".to_string()
}
