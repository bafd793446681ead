//! Typed error kinds shared across the fleet.
//!
//! Every process classifies failures into one of four kinds so callers can
//! decide how to react without string matching: transient I/O is retried
//! once then reported with a sentinel, protocol violations drop the offending
//! frame and leave state untouched, a resource being absent blocks dependent
//! controllers until it is known, and fatal errors end the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AalError {
    #[error("transient I/O error: {0}")]
    Transient(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("resource not available: {0}")]
    ResourceAbsent(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

pub type AalResult<T> = Result<T, AalError>;
