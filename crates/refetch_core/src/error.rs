// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for the cache engine.

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointKind;

/// An error from engine construction or endpoint lookup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Two endpoints were registered under the same name.
    #[error("duplicate endpoint `{name}`")]
    DuplicateEndpoint {
        /// The name that was registered more than once.
        name: String,
    },

    /// An operation referenced an endpoint that is not registered, or is
    /// registered as a different kind.
    #[error("unknown {kind} endpoint `{name}`")]
    UnknownEndpoint {
        /// The name that failed to resolve.
        name: String,
        /// The kind of endpoint the operation expected.
        kind: EndpointKind,
    },

    /// The engine was built without a task spawner and no default is
    /// available.
    #[error("no task spawner configured")]
    MissingSpawner,
}

/// A specialized [`Result`] type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure reported by an endpoint's transport.
///
/// Unlike [`Error`], transport errors are part of the cached state: a rejected
/// query stores its error in the cache entry where every subscriber can read
/// it. The type is therefore cloneable and serializable, carrying only a
/// message rather than a live error chain.
///
/// # Examples
///
/// ```
/// use refetch_core::TransportError;
///
/// let error = TransportError::new("connection reset");
/// assert_eq!(error.message(), "connection reset");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Creates a transport error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a transport error by flattening an underlying error into its
    /// display form.
    pub fn from_source(source: &(impl std::error::Error + ?Sized)) -> Self {
        Self {
            message: source.to_string(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_endpoint_display_names_the_endpoint() {
        let error = Error::DuplicateEndpoint {
            name: "getPosts".to_string(),
        };
        assert_eq!(format!("{error}"), "duplicate endpoint `getPosts`");
    }

    #[test]
    fn unknown_endpoint_display_names_the_expected_kind() {
        let error = Error::UnknownEndpoint {
            name: "getPosts".to_string(),
            kind: EndpointKind::Mutation,
        };
        assert_eq!(format!("{error}"), "unknown mutation endpoint `getPosts`");
    }

    #[test]
    fn transport_error_round_trips_through_json() {
        let error = TransportError::new("service unavailable");
        let json = serde_json::to_string(&error).expect("serializes");
        let back: TransportError = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, error);
    }

    #[test]
    fn transport_error_from_source_uses_display() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let error = TransportError::from_source(&io);
        assert_eq!(error.message(), "deadline elapsed");
    }
}
