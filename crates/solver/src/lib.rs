pub mod browser;
pub mod challenge;
pub mod identity;

pub use browser::{BrowserSession, HeadlessSession};
pub use challenge::{detect_challenge, extract_clearance, ChallengeSolver, SolveOutcome};
pub use identity::{client_profile, random_chrome_user_agent};
