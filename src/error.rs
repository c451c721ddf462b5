use std::{borrow::Cow, error, fmt};

use http::{header, StatusCode};
use serde_json::Value;

use crate::{Body, Response};

/// The error branch of the result contract returned by every handler.
///
/// It carries a message which is sent verbatim as the plain-text response body and an HTTP status which defaults to `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub(crate) status: StatusCode,
    pub(crate) message: Cow<'static, str>,
}

impl Error {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Construct an error with an explicit status.
    ///
    /// Anything which isn't a client or server error status falls back to `400 Bad Request`.
    pub fn with_status(status: u16, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: StatusCode::from_u16(status)
                .ok()
                .filter(|status| status.is_client_error() || status.is_server_error())
                .unwrap_or(StatusCode::BAD_REQUEST),
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_status(code.to_status_code(), message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> Option<ErrorCode> {
        ErrorCode::from_status_code(self.status.as_u16())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "typeknit::Error {{ status: {}, message: {} }}",
            self.status.as_u16(),
            self.message
        )
    }
}

impl error::Error for Error {}

/// The Rust form of the result contract.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shorthand for the success branch of the result contract.
pub fn ok<T>(data: T) -> Result<T> {
    Ok(data)
}

/// Shorthand for the error branch of the result contract.
pub fn err<T>(error: impl Into<Cow<'static, str>>, status: Option<u16>) -> Result<T> {
    Err(match status {
        Some(status) => Error::with_status(status, error),
        None => Error::new(error),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    MethodNotSupported,
    ClientClosedRequest,
    InternalServerError,
}

impl ErrorCode {
    pub fn to_status_code(&self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Timeout => 408,
            ErrorCode::Conflict => 409,
            ErrorCode::PreconditionFailed => 412,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::MethodNotSupported => 405,
            ErrorCode::ClientClosedRequest => 499,
            ErrorCode::InternalServerError => 500,
        }
    }

    pub const fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            400 => Some(ErrorCode::BadRequest),
            401 => Some(ErrorCode::Unauthorized),
            403 => Some(ErrorCode::Forbidden),
            404 => Some(ErrorCode::NotFound),
            408 => Some(ErrorCode::Timeout),
            409 => Some(ErrorCode::Conflict),
            412 => Some(ErrorCode::PreconditionFailed),
            413 => Some(ErrorCode::PayloadTooLarge),
            405 => Some(ErrorCode::MethodNotSupported),
            499 => Some(ErrorCode::ClientClosedRequest),
            500 => Some(ErrorCode::InternalServerError),
            _ => None,
        }
    }
}

/// A failure while dispatching a request.
///
/// None of these cross the HTTP boundary as a Rust error, they are all turned into a response by [`ExecError::into_response`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ExecError {
    #[error("bad request")]
    BadRequest,
    #[error("request body exceeded the limit of {0} bytes")]
    PayloadTooLarge(usize),
    #[error("route not found")]
    RouteNotFound,
    #[error("argument failed validation")]
    Validation(Value),
    #[error("resolver: {0}")]
    Resolver(#[from] Error),
    #[error("error serializing procedure result: {0}")]
    SerializeResult(serde_json::Error),
}

impl ExecError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExecError::BadRequest | ExecError::Validation(_) => StatusCode::BAD_REQUEST,
            ExecError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ExecError::RouteNotFound => StatusCode::NOT_FOUND,
            ExecError::Resolver(err) => err.status,
            ExecError::SerializeResult(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // The validator's payload is surfaced as-is, no message is synthesized for it.
            ExecError::Validation(payload) => match serde_json::to_vec(&payload) {
                Ok(body) => build(status, "application/json", body.into()),
                Err(_) => build(status, "text/plain; charset=utf-8", "bad request".into()),
            },
            ExecError::Resolver(err) => build(
                status,
                "text/plain; charset=utf-8",
                err.message.into_owned().into(),
            ),
            ExecError::SerializeResult(_) => build(
                status,
                "text/plain; charset=utf-8",
                "error serializing procedure result".into(),
            ),
            err => build(status, "text/plain; charset=utf-8", err.to_string().into()),
        }
    }
}

pub(crate) fn build(status: StatusCode, content_type: &'static str, body: Body) -> Response {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_defaults_to_bad_request() {
        assert_eq!(Error::new("nope").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::with_status(1000, "nope").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::with_status(599, "nope").status().as_u16(), 599);
    }

    #[test]
    fn success_statuses_cannot_be_errors() {
        for status in [100, 200, 204, 302, 600] {
            assert_eq!(
                Error::with_status(status, "nope").status(),
                StatusCode::BAD_REQUEST,
                "{status}"
            );
        }
    }

    #[test]
    fn error_helpers_keep_their_status() {
        assert_eq!(
            Error::from_code(ErrorCode::Forbidden, "nope").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            err::<()>("teapot", Some(418)).unwrap_err().status().as_u16(),
            418
        );
    }

    #[test]
    fn error_codes_round_trip_through_status() {
        for code in [
            ErrorCode::BadRequest,
            ErrorCode::NotFound,
            ErrorCode::PayloadTooLarge,
            ErrorCode::ClientClosedRequest,
            ErrorCode::InternalServerError,
        ] {
            assert_eq!(ErrorCode::from_status_code(code.to_status_code()), Some(code));
        }
        assert_eq!(ErrorCode::from_status_code(418), None);
    }

    #[test]
    fn exec_errors_map_to_statuses() {
        assert_eq!(ExecError::BadRequest.into_response().status(), 400);
        assert_eq!(ExecError::RouteNotFound.into_response().status(), 404);
        assert_eq!(ExecError::PayloadTooLarge(1).into_response().status(), 413);
        assert_eq!(
            ExecError::Resolver(Error::with_status(409, "taken"))
                .into_response()
                .status(),
            409
        );
    }
}
