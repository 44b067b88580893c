use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend could not be reached.
    Network,
    /// The backend answered with a non-success status.
    Server(u16),
    /// The current position could not be acquired.
    Geolocation,
    /// A success response did not carry the expected payload.
    Validation,
    Config,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Server(status) => write!(f, "server error ({}): {}", status, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        config_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

pub fn network_error<T: Display>(err: T) -> Error {
    Error::new(ErrorKind::Network, err.to_string())
}

pub fn server_error(status: u16, message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Server(status), message)
}

pub fn geolocation_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Geolocation, message)
}

pub fn validation_error<T: Display>(err: T) -> Error {
    Error::new(ErrorKind::Validation, err.to_string())
}

pub fn config_error<T: Display>(err: T) -> Error {
    Error::new(ErrorKind::Config, err.to_string())
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    if err.is_decode() {
        return validation_error(err);
    }

    match err.status() {
        Some(status) => server_error(
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status"),
        ),
        None => network_error(err),
    }
}

/// What gets surfaced to whoever renders the state: a message and nothing else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(err: &Error, fallback: &str) -> Self {
        if err.message.trim().is_empty() {
            Self::new(fallback)
        } else {
            Self::new(err.message.clone())
        }
    }
}

#[test]
fn error_info_falls_back_on_empty_message() {
    let err = network_error("");
    assert_eq!(
        ErrorInfo::from_error(&err, "Failed to update places."),
        ErrorInfo::new("Failed to update places.")
    );

    let err = server_error(500, "disk full");
    assert_eq!(ErrorInfo::from_error(&err, "fallback").message, "disk full");
}

#[test]
fn display_includes_status() {
    let err = server_error(404, "Not Found");
    assert_eq!(err.to_string(), "server error (404): Not Found");
    assert_eq!(config_error("bad value").to_string(), "bad value");
}
