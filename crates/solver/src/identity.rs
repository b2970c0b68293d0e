//! Client identity helpers: user-agent selection, metadata synthesis, and
//! expiry formatting for persisted snapshots.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;

use clearfetch_core::{BrandVersion, ClientProfile};

/// Recent desktop Chrome user agents, Edge excluded. One is picked at random
/// when the config does not pin an identity.
pub const CHROME_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36",
];

pub fn random_chrome_user_agent() -> &'static str {
    CHROME_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(CHROME_USER_AGENTS[0])
}

static BROWSER_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Chrome/(\d+)").unwrap());

static PARENTHETICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").unwrap());

static NT_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Windows NT ([\d.]+)").unwrap());

static MAC_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Mac OS X ([\d_]+)").unwrap());

static ANDROID_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Android ([\d.]+)").unwrap());

/// Synthesize structured identity attributes from a user-agent string, for
/// reuse in layered override configuration.
pub fn client_profile(user_agent: &str) -> ClientProfile {
    let browser_version = BROWSER_VERSION_RE
        .captures(user_agent)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let parenthetical = PARENTHETICAL_RE
        .captures(user_agent)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let (platform, platform_version) = if parenthetical.contains("Windows") {
        (
            "Windows".to_string(),
            NT_VERSION_RE
                .captures(&parenthetical)
                .map(|c| c[1].to_string())
                .unwrap_or_default(),
        )
    } else if parenthetical.contains("Mac OS X") {
        (
            "macOS".to_string(),
            MAC_VERSION_RE
                .captures(&parenthetical)
                .map(|c| c[1].replace('_', "."))
                .unwrap_or_default(),
        )
    } else if parenthetical.contains("Android") {
        (
            "Android".to_string(),
            ANDROID_VERSION_RE
                .captures(&parenthetical)
                .map(|c| c[1].to_string())
                .unwrap_or_default(),
        )
    } else if parenthetical.contains("Linux") {
        ("Linux".to_string(), String::new())
    } else {
        (String::new(), String::new())
    };

    let mobile = user_agent.contains("Mobile") || platform == "Android";

    let brands = vec![
        BrandVersion {
            brand: "Not)A;Brand".to_string(),
            version: "8".to_string(),
        },
        BrandVersion {
            brand: "Chromium".to_string(),
            version: browser_version.clone(),
        },
        BrandVersion {
            brand: "Google Chrome".to_string(),
            version: browser_version.clone(),
        },
    ];

    ClientProfile {
        architecture: "x86".to_string(),
        bitness: "64".to_string(),
        platform,
        platform_version,
        browser_version,
        brands,
        mobile,
    }
}

/// Human-readable expiry for snapshot records: an absolute date when more
/// than a day out, otherwise the remaining hours/minutes/seconds.
pub fn format_expiry(expires_ms: f64) -> String {
    let Some(expires) = Utc.timestamp_millis_opt(expires_ms as i64).single() else {
        return String::new();
    };
    format_expiry_from(expires, Utc::now())
}

fn format_expiry_from(expires: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = expires - now;
    if delta.num_days() > 1 {
        expires.format("%B %d, %Y at %H:%M %Z").to_string()
    } else {
        let secs = delta.num_seconds().max(0);
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;
        format!("{hours} hours, {minutes} minutes and {seconds} seconds")
    }
}
