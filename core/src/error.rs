//! Error types for the Unipol Move client.
//!
//! # Design
//! Every failure that crosses the network boundary carries the endpoint it
//! came from, and HTTP failures keep the raw status and body for debugging.
//! `LocalIo` holds on to the downloaded PDF so a failed local write never
//! throws away a report the service already rendered.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The login endpoint rejected the credentials or did not issue both
    /// session cookies.
    #[error("authentication failed{}: {reason}", status_suffix(.status))]
    Authentication { status: Option<u16>, reason: String },

    /// An authenticated operation was attempted before a successful login.
    #[error("not authenticated: call login() first")]
    NotAuthenticated,

    /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The service answered with a non-success status or an error envelope.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Pagination parameters rejected before any request was sent.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The service kept returning full pages past the configured page cap.
    #[error("pagination did not terminate after {pages} pages")]
    PaginationOverrun { pages: u32 },

    /// The report was downloaded but could not be written to disk.
    #[error("failed to write report to {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        pdf: Vec<u8>,
    },
}

impl ApiError {
    /// HTTP status associated with the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } => *status,
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_message_includes_status_when_known() {
        let err = ApiError::Authentication {
            status: Some(401),
            reason: "bad credentials".into(),
        };
        assert_eq!(err.to_string(), "authentication failed (HTTP 401): bad credentials");

        let err = ApiError::Authentication {
            status: None,
            reason: "missing MRHSession".into(),
        };
        assert_eq!(err.to_string(), "authentication failed: missing MRHSession");
    }

    #[test]
    fn status_accessor() {
        let err = ApiError::Http {
            status: 503,
            endpoint: "/x".into(),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(ApiError::NotAuthenticated.status(), None);
    }

    #[test]
    fn local_io_exposes_source() {
        use std::error::Error as _;
        let err = ApiError::LocalIo {
            path: PathBuf::from("/nope/report.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such dir"),
            pdf: b"%PDF".to_vec(),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/nope/report.pdf"));
    }
}
