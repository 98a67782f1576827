use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Browser not reachable at {0}. Start it with --remote-debugging-port or pass --cdp-port.")]
    BrowserNotRunning(String),

    #[error("No open tab found in the browser")]
    NoPageFound,

    #[error("Tab {0} was closed")]
    PageClosed(String),

    #[error("CDP connection failed: {0}")]
    CdpConnectionFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not a video reference: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CheckerError>;
