use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the directory, the result cache and the mediator.
///
/// Every variant carries a rendered message so the type stays `Clone`; a
/// single collapsed fetch hands the same outcome to all of its waiters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed resource: {0}")]
    MalformedResource(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl Error {
    pub fn storage(err: impl Display) -> Self { Self::Storage(err.to_string()) }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self { Self::storage(err) }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self { Self::storage(err) }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self { Self::ResourceUnavailable(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a remote search resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote status {0}")]
    Status(u16),

    #[error("unreadable payload: {0}")]
    Payload(String),
}
