use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by the security group provider.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("args must be 'open' or 'close', got '{0}'")]
    UnknownAction(String),
    #[error("invalid endpoint url {0}")]
    InvalidEndpoint(String),
    #[error("endpoint {0} returned an invalid address: {1:?}")]
    InvalidAddress(String, String),
    #[error("endpoint {0} returned an oversized body")]
    BodyTooLarge(String),
    #[error("not found public ip")]
    NoAddressFound,
    #[error("public ip lookup timed out after {0:?}")]
    ResolveTimeout(Duration),
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    Provider(BoxError),
}
