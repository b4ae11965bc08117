use thiserror::Error;

/// Errors produced while configuring or running a speed test.
///
/// Transport variants never escape a full run: the probes catch them per
/// trial. Only `Cancelled` and `AlreadyRunning` reach callers of
/// `SpeedTest::run_full_test`.
#[derive(Error, Debug)]
pub enum SpeedError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("speed test cancelled")]
    Cancelled,

    #[error("a speed test is already running")]
    AlreadyRunning,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logger setup failed: {0}")]
    Logger(String),
}

impl From<serde_yml::Error> for SpeedError {
    fn from(err: serde_yml::Error) -> Self {
        SpeedError::Config(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SpeedError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SpeedError::Timeout
    }
}

pub type Result<T> = std::result::Result<T, SpeedError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_a_timeout() {
        let elapsed = tokio::time::timeout(Duration::from_millis(10), std::future::pending::<()>())
            .await
            .unwrap_err();
        let err = SpeedError::from(elapsed);
        assert!(matches!(err, SpeedError::Timeout));
        assert_eq!(err.to_string(), "request timed out");
    }

    #[test]
    fn yaml_errors_are_config_errors() {
        let err = SpeedError::from(serde_yml::from_str::<u32>("[").unwrap_err());
        assert!(matches!(err, SpeedError::Config(_)));
    }
}
