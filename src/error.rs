//! Error taxonomy: terminal session failures and local REST-call failures.

use reqwest::StatusCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that prevent a quiz session from starting or end it for good.
///
/// Everything here is terminal for the session: there is no retry or
/// reconnect policy, a failed session is surfaced to the user and torn down.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No party id was supplied, so the session can never start.
    #[error("party id is missing")]
    MissingPartyId,
    /// Opening the realtime channel failed.
    #[error("failed to connect to the party channel")]
    Connect(#[source] tungstenite::Error),
    /// The realtime channel reported an error after it was open.
    #[error("party channel error")]
    Channel(#[source] tungstenite::Error),
    /// The server closed the realtime channel mid-session.
    #[error("party channel closed by the server")]
    ChannelClosed,
}

/// Failures from the collaborator REST endpoints.
///
/// These are local to the action that triggered them; an already-running
/// session is not affected by a failing REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload failed client-side validation.
    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),
    /// The request could not be sent or the connection dropped mid-flight.
    #[error("request to `{path}` failed")]
    Request {
        /// Endpoint path the request targeted.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("`{path}` returned {status}: {body}")]
    Status {
        /// Endpoint path the request targeted.
        path: String,
        /// Status code of the response.
        status: StatusCode,
        /// Response body, surfaced in the user-facing notice.
        body: String,
    },
    /// The response body did not match the expected schema.
    #[error("failed to decode response from `{path}`")]
    Decode {
        /// Endpoint path the request targeted.
        path: String,
        /// Underlying decode failure.
        #[source]
        source: reqwest::Error,
    },
}
