use std::time::Duration;

/// Errors raised while provisioning or driving the e2e networks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Custom(String),
    #[error("rpc error: {0}")]
    RpcError(String),
    #[error("key error: {0}")]
    Key(String),
    #[error("`{command}` exited with status {code:?}: {stderr}")]
    Exec {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("timed out after {elapsed:?} waiting for {description}")]
    Timeout {
        description: String,
        elapsed: Duration,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Self::Custom(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Self::Custom(error.to_string())
    }
}
