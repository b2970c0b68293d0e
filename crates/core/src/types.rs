use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HarvestError;

/// Name of the credential cookie issued once a challenge is passed.
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

/// Identity replayed when a snapshot was recorded without one.
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

/// Challenge platform variants, keyed by the marker the interstitial embeds
/// in its page source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Javascript,
    Managed,
    Interactive,
}

impl ChallengeKind {
    pub const ALL: [ChallengeKind; 3] = [
        ChallengeKind::Javascript,
        ChallengeKind::Managed,
        ChallengeKind::Interactive,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChallengeKind::Javascript => "non-interactive",
            ChallengeKind::Managed => "managed",
            ChallengeKind::Interactive => "interactive",
        }
    }

    /// The literal the challenge page embeds, e.g. `cType: 'managed'`.
    pub fn page_marker(&self) -> String {
        format!("cType: '{}'", self.label())
    }
}

/// One cookie as observed in the browser at acquisition time.
/// `expires` is epoch milliseconds; minimal records without path/flags parse
/// through the serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub expires: f64,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "httpOnly", default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// On-disk record of one acquisition: the full cookie set observed in the
/// session, the live user agent, and a human-readable expiry (informational).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub cookies: Vec<CookieRecord>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub expires: String,
}

/// A clearance credential paired with the client identity it was issued to.
/// The issuing service binds the two together; they are only ever swapped as
/// a unit.
#[derive(Debug, Clone)]
pub struct ClearanceToken {
    pub value: String,
    pub client_identity: String,
    pub domain: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub cookies: Vec<CookieRecord>,
}

impl ClearanceToken {
    /// Build a usable token from a stored snapshot.
    pub fn from_snapshot(key: &str, snapshot: &TokenSnapshot) -> Result<Self, HarvestError> {
        let clearance = snapshot
            .cookies
            .iter()
            .find(|c| c.name == CLEARANCE_COOKIE)
            .ok_or_else(|| {
                HarvestError::MalformedToken(format!("no {CLEARANCE_COOKIE} cookie recorded for {key}"))
            })?;

        let client_identity = if snapshot.user_agent.is_empty() {
            FALLBACK_USER_AGENT.to_string()
        } else {
            snapshot.user_agent.clone()
        };

        let expires_at = (clearance.expires > 0.0)
            .then(|| Utc.timestamp_millis_opt(clearance.expires as i64).single())
            .flatten();

        Ok(Self {
            value: clearance.value.clone(),
            client_identity,
            domain: key.to_string(),
            expires_at,
            cookies: snapshot.cookies.clone(),
        })
    }
}

/// One page to fetch, in run order.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub label: String,
    pub url: Url,
}

/// Result of executing a single fetch task.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub status: u16,
    pub body: String,
    pub final_url: Url,
    pub blocked: bool,
}

/// A viewport coordinate used for the synthetic challenge interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportPoint {
    pub x: f64,
    pub y: f64,
}

/// Browser brand/version pair, as exposed through client hints.
#[derive(Debug, Clone, Serialize)]
pub struct BrandVersion {
    pub brand: String,
    pub version: String,
}

/// Structured identity attributes derived from the user-agent string,
/// kept for layered override configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ClientProfile {
    pub architecture: String,
    pub bitness: String,
    pub platform: String,
    pub platform_version: String,
    pub browser_version: String,
    pub brands: Vec<BrandVersion>,
    pub mobile: bool,
}

/// What the extractor pulls out of every listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub category: String,
    pub description: String,
    pub phones: Vec<String>,
    pub new: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(cookies: Vec<CookieRecord>, user_agent: &str) -> TokenSnapshot {
        TokenSnapshot {
            cookies,
            user_agent: user_agent.to_string(),
            expires: String::new(),
        }
    }

    fn clearance_cookie(value: &str) -> CookieRecord {
        CookieRecord {
            name: CLEARANCE_COOKIE.to_string(),
            value: value.to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires: 1_900_000_000_000.0,
            secure: true,
            http_only: true,
        }
    }

    #[test]
    fn token_pairs_credential_with_identity() {
        let snapshot = snapshot_with(vec![clearance_cookie("abc")], "test-agent/1.0");
        let token = ClearanceToken::from_snapshot("example.com", &snapshot).unwrap();

        assert_eq!(token.value, "abc");
        assert_eq!(token.client_identity, "test-agent/1.0");
        assert_eq!(token.domain, "example.com");
        assert!(token.expires_at.is_some());
    }

    #[test]
    fn token_without_clearance_cookie_is_malformed() {
        let other = CookieRecord {
            name: "session".to_string(),
            value: "xyz".to_string(),
            domain: String::new(),
            path: "/".to_string(),
            expires: 0.0,
            secure: false,
            http_only: false,
        };
        let snapshot = snapshot_with(vec![other], "test-agent/1.0");

        let err = ClearanceToken::from_snapshot("example.com", &snapshot).unwrap_err();
        assert!(matches!(err, HarvestError::MalformedToken(_)));
    }

    #[test]
    fn missing_user_agent_falls_back_to_default() {
        let snapshot = snapshot_with(vec![clearance_cookie("abc")], "");
        let token = ClearanceToken::from_snapshot("example.com", &snapshot).unwrap();

        assert_eq!(token.client_identity, FALLBACK_USER_AGENT);
    }

    #[test]
    fn minimal_cookie_record_parses() {
        let cookie: CookieRecord = serde_json::from_str(
            r#"{"name": "cf_clearance", "value": "v", "domain": ".example.com", "expires": 1000.5}"#,
        )
        .unwrap();

        assert_eq!(cookie.path, "/");
        assert!(!cookie.secure);
        assert!(!cookie.http_only);
    }

    #[test]
    fn challenge_markers_match_page_literals() {
        assert_eq!(ChallengeKind::Javascript.page_marker(), "cType: 'non-interactive'");
        assert_eq!(ChallengeKind::Managed.page_marker(), "cType: 'managed'");
        assert_eq!(ChallengeKind::Interactive.page_marker(), "cType: 'interactive'");
    }
}
