//! Challenge-acquisition state machine.
//!
//! Navigate, short-circuit if the clearance cookie is already present, detect
//! the challenge kind from the rendered page, then interact once per second
//! until the cookie appears or the wall-clock timeout expires. Every outcome
//! except a captured cookie is terminal for the attempt; retrying a solve is
//! the caller's decision.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use clearfetch_core::{
    ChallengeKind, ClearanceToken, ClientProfile, CookieRecord, HarvestError, TokenSnapshot,
    ViewportPoint, CLEARANCE_COOKIE,
};

use crate::browser::BrowserSession;
use crate::identity::{client_profile, format_expiry};

/// Everything captured from a successful solve.
#[derive(Debug)]
pub struct SolveOutcome {
    pub token: ClearanceToken,
    pub snapshot: TokenSnapshot,
    pub profile: ClientProfile,
    /// `None` when the cookie was already present and nothing was solved.
    pub challenge: Option<ChallengeKind>,
}

pub struct ChallengeSolver<S> {
    session: S,
    interaction_point: ViewportPoint,
    timeout: Duration,
}

const INTERACTION_INTERVAL: Duration = Duration::from_secs(1);

impl<S: BrowserSession> ChallengeSolver<S> {
    pub fn new(session: S, interaction_point: ViewportPoint, timeout: Duration) -> Self {
        Self {
            session,
            interaction_point,
            timeout,
        }
    }

    pub async fn solve(&self, url: &str) -> Result<SolveOutcome, HarvestError> {
        self.session.navigate(url).await?;

        let cookies = self.session.cookies().await?;
        if extract_clearance(&cookies).is_some() {
            info!("clearance cookie already present, no challenge issued");
            return self.capture(url, None).await;
        }

        let html = self.session.rendered_html().await?;
        let Some(kind) = detect_challenge(&html) else {
            return Err(HarvestError::ChallengeNotDetected);
        };
        info!(kind = kind.label(), "solving challenge");

        // The interaction targets a fixed viewport coordinate; if the widget
        // is not at that location this loop spins until the timeout.
        let started = Instant::now();
        loop {
            if started.elapsed() >= self.timeout {
                return Err(HarvestError::ChallengeTimeout(self.timeout.as_secs()));
            }

            self.session
                .simulate_challenge_interaction(self.interaction_point)
                .await?;
            tokio::time::sleep(INTERACTION_INTERVAL).await;

            let cookies = self.session.cookies().await?;
            if extract_clearance(&cookies).is_some() {
                break;
            }
            debug!(elapsed_s = started.elapsed().as_secs(), "clearance cookie not issued yet");
        }

        self.capture(url, Some(kind)).await
    }

    async fn capture(
        &self,
        url: &str,
        challenge: Option<ChallengeKind>,
    ) -> Result<SolveOutcome, HarvestError> {
        let cookies = self.session.cookies().await?;
        let clearance_expires = extract_clearance(&cookies)
            .map(|c| c.expires)
            .unwrap_or_default();

        // Capture the live identity after navigation: some environments
        // randomize it per session, and the credential is bound to it.
        let user_agent = self.session.client_identity().await?;
        let profile = client_profile(&user_agent);

        let snapshot = TokenSnapshot {
            cookies,
            user_agent,
            expires: format_expiry(clearance_expires),
        };
        let token = ClearanceToken::from_snapshot(url, &snapshot)?;

        info!(domain = %token.domain, "captured clearance token");
        Ok(SolveOutcome {
            token,
            snapshot,
            profile,
            challenge,
        })
    }
}

/// Identify which challenge platform the rendered page carries, if any.
pub fn detect_challenge(html: &str) -> Option<ChallengeKind> {
    ChallengeKind::ALL
        .iter()
        .copied()
        .find(|kind| html.contains(&kind.page_marker()))
}

pub fn extract_clearance(cookies: &[CookieRecord]) -> Option<&CookieRecord> {
    cookies.iter().find(|c| c.name == CLEARANCE_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const POINT: ViewportPoint = ViewportPoint { x: 532.0, y: 375.0 };
    const AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

    fn clearance(value: &str) -> CookieRecord {
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

    /// Scripted session: the clearance cookie appears after a configurable
    /// number of interactions (`None` = never).
    struct ScriptedSession {
        html: String,
        cookie_after: Option<usize>,
        interactions: AtomicUsize,
        navigations: Mutex<Vec<String>>,
        preset_cookies: Vec<CookieRecord>,
    }

    impl ScriptedSession {
        fn new(html: &str, cookie_after: Option<usize>) -> Self {
            Self {
                html: html.to_string(),
                cookie_after,
                interactions: AtomicUsize::new(0),
                navigations: Mutex::new(Vec::new()),
                preset_cookies: Vec::new(),
            }
        }

        fn with_preset_cookies(mut self, cookies: Vec<CookieRecord>) -> Self {
            self.preset_cookies = cookies;
            self
        }

        fn cookie_issued(&self) -> bool {
            self.cookie_after
                .map(|n| self.interactions.load(Ordering::SeqCst) >= n)
                .unwrap_or(false)
        }
    }

    #[async_trait]
    impl<'a> BrowserSession for &'a ScriptedSession {
        async fn navigate(&self, url: &str) -> Result<(), HarvestError> {
            self.navigations.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn cookies(&self) -> Result<Vec<CookieRecord>, HarvestError> {
            let mut cookies = self.preset_cookies.clone();
            if self.cookie_issued() {
                cookies.push(clearance("issued"));
            }
            Ok(cookies)
        }

        async fn rendered_html(&self) -> Result<String, HarvestError> {
            Ok(self.html.clone())
        }

        async fn client_identity(&self) -> Result<String, HarvestError> {
            Ok(AGENT.to_string())
        }

        async fn simulate_challenge_interaction(
            &self,
            _point: ViewportPoint,
        ) -> Result<(), HarvestError> {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    const MANAGED_PAGE: &str = "<html><script>cType: 'managed'</script></html>";

    #[tokio::test]
    async fn preexisting_cookie_short_circuits_without_interaction() {
        let session = ScriptedSession::new("<html>plain</html>", None)
            .with_preset_cookies(vec![clearance("cached")]);
        let solver = ChallengeSolver::new(&session, POINT, Duration::from_secs(30));

        let outcome = solver.solve("https://www.example.com/").await.unwrap();

        assert_eq!(outcome.token.value, "cached");
        assert_eq!(outcome.token.client_identity, AGENT);
        assert!(outcome.challenge.is_none());
        assert_eq!(session.interactions.load(Ordering::SeqCst), 0);
        assert_eq!(
            *session.navigations.lock().unwrap(),
            vec!["https://www.example.com/".to_string()]
        );
    }

    #[tokio::test]
    async fn page_without_markers_is_challenge_not_detected() {
        let session = ScriptedSession::new("<html><body>welcome</body></html>", None);
        let solver = ChallengeSolver::new(&session, POINT, Duration::from_secs(30));

        let err = solver.solve("https://www.example.com/").await.unwrap_err();

        assert!(matches!(err, HarvestError::ChallengeNotDetected));
        assert_eq!(session.interactions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interacts_once_per_second_until_cookie_appears() {
        let session = ScriptedSession::new(MANAGED_PAGE, Some(3));
        let solver = ChallengeSolver::new(&session, POINT, Duration::from_secs(30));

        let outcome = solver.solve("https://www.example.com/").await.unwrap();

        assert_eq!(outcome.token.value, "issued");
        assert_eq!(outcome.challenge, Some(ChallengeKind::Managed));
        assert_eq!(session.interactions.load(Ordering::SeqCst), 3);
        // Snapshot carries the same cookie set and identity as the token.
        assert_eq!(outcome.snapshot.user_agent, AGENT);
        assert!(outcome
            .snapshot
            .cookies
            .iter()
            .any(|c| c.name == CLEARANCE_COOKIE));
    }

    #[tokio::test(start_paused = true)]
    async fn interaction_that_never_lands_times_out() {
        // The fixed-coordinate interaction misses the widget entirely: the
        // loop keeps clicking and re-checking until the deadline.
        let session = ScriptedSession::new(MANAGED_PAGE, None);
        let solver = ChallengeSolver::new(&session, POINT, Duration::from_secs(5));

        let err = solver.solve("https://www.example.com/").await.unwrap_err();

        assert!(matches!(err, HarvestError::ChallengeTimeout(5)));
        assert_eq!(session.interactions.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn token_and_identity_come_from_the_same_capture() {
        let session = ScriptedSession::new(MANAGED_PAGE, Some(1));
        let solver = ChallengeSolver::new(&session, POINT, Duration::from_secs(30));

        let outcome = solver.solve("https://www.example.com/").await.unwrap();

        assert_eq!(outcome.token.client_identity, outcome.snapshot.user_agent);
        assert_eq!(outcome.profile.platform, "Windows");
        assert_eq!(outcome.profile.browser_version, "141");
    }

    #[test]
    fn detect_challenge_recognizes_each_kind() {
        assert_eq!(
            detect_challenge("cType: 'non-interactive'"),
            Some(ChallengeKind::Javascript)
        );
        assert_eq!(detect_challenge("cType: 'managed'"), Some(ChallengeKind::Managed));
        assert_eq!(
            detect_challenge("cType: 'interactive'"),
            Some(ChallengeKind::Interactive)
        );
        assert_eq!(detect_challenge("<html>just content</html>"), None);
    }
}
