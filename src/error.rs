use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to validate ready url: {0}")]
    InvalidReadyUrl(String),
    #[error("failed to parse problem id: {0}")]
    ProblemId(String),
    #[error("failed to parse challenge id: {0}")]
    ChallengeId(String),
    #[error("timed out after {timeout:?} waiting for {target} to become clickable")]
    Timeout { target: String, timeout: Duration },
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("no <title> found in page")]
    TitleNotFound,
}

impl From<fantoccini::error::CmdError> for WorkspaceError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        Self::Browser(err.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for WorkspaceError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        Self::Browser(err.to_string())
    }
}
