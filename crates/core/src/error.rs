use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("no usable clearance credential: {0}")]
    CredentialMissing(String),

    #[error("no challenge detected on page")]
    ChallengeNotDetected,

    #[error("challenge solve timed out after {0}s")]
    ChallengeTimeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed token record: {0}")]
    MalformedToken(String),

    #[error("corrupt token file: {0}")]
    CorruptTokenFile(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
