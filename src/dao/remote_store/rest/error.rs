//! Error types shared by the REST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`RestDaoError`] failures.
pub type RestResult<T> = Result<T, RestDaoError>;

/// Failures that can occur while interacting with the hosted REST endpoint.
#[derive(Debug, Error)]
pub enum RestDaoError {
    /// Required environment variable is missing.
    #[error("missing store environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build store client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send store request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint refused the request (4xx).
    #[error("store rejected `{path}` with status {status}")]
    Rejected {
        path: String,
        status: StatusCode,
        body: String,
    },
    /// The endpoint failed to serve the request (5xx or unexpected status).
    #[error("unexpected store response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode store response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A write answered with an empty representation.
    #[error("store returned no row for `{path}`")]
    EmptyRepresentation { path: String },
    /// A count request answered without a usable `Content-Range` header.
    #[error("missing or invalid Content-Range header for `{path}`")]
    MissingCount { path: String },
}
