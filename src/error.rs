use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("{0}")]
    Usage(String),

    #[error("No GitHub token found. Set GITHUB_API_KEY (or GITHUB_TOKEN) in the environment.")]
    AuthConfig,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
}

impl RosterError {
    /// Wrap an octocrab failure with the operation that produced it.
    pub fn api(context: impl std::fmt::Display, err: octocrab::Error) -> Self {
        RosterError::GitHub(format!("{context}: {err}"))
    }

    /// True when stdout went away underneath us, e.g. `github-org-users acme | head`.
    pub fn is_broken_pipe(&self) -> bool {
        let io = match self {
            RosterError::Io(e) => Some(e),
            RosterError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(e) => Some(e),
                _ => None,
            },
            _ => None,
        };
        io.is_some_and(|e| e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

impl From<octocrab::Error> for RosterError {
    fn from(err: octocrab::Error) -> Self {
        RosterError::GitHub(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
