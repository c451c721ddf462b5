use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use crate::{Body, BodyError, Config, ExecError};

/// The JSON body of every request: one raw argument per argument-taking terminal in the call chain, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Envelope {
    pub args: Vec<Value>,
}

impl Envelope {
    pub fn new(args: Vec<Value>) -> Self {
        Self { args }
    }

    /// Parse a request body into an envelope.
    ///
    /// The body must be a JSON object. A missing or `null` `args` field is treated as an empty list, anything else that isn't an array is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self, ExecError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| ExecError::BadRequest)?;
        let Value::Object(mut object) = value else {
            return Err(ExecError::BadRequest);
        };

        match object.remove("args") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Array(args)) => Ok(Self { args }),
            Some(_) => Err(ExecError::BadRequest),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Per-request dispatch state: the path segments and arguments which have not been consumed yet.
///
/// Both queues are only ever popped from the front as dispatch descends the route tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    segments: VecDeque<String>,
    args: VecDeque<Value>,
}

impl Cursor {
    pub fn new(
        segments: impl IntoIterator<Item = impl Into<String>>,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            args: args.into_iter().collect(),
        }
    }

    /// Split a request path into segments after stripping the mount `prefix`.
    ///
    /// A path outside of the prefix produces no segments at all.
    pub fn from_path(prefix: &str, path: &str, envelope: Envelope) -> Self {
        let segments = match path.strip_prefix(prefix) {
            Some("") | None => VecDeque::new(),
            Some(rest) => rest.split('/').map(String::from).collect(),
        };

        Self {
            segments,
            args: envelope.args.into(),
        }
    }

    pub(crate) async fn from_request(
        config: &Config,
        path: &str,
        body: Body,
    ) -> Result<Self, ExecError> {
        let body = body.collect(config.body_limit).await.map_err(|err| match err {
            BodyError::LengthLimit(limit) => ExecError::PayloadTooLarge(limit),
            BodyError::Read(_) => ExecError::BadRequest,
        })?;

        Ok(Self::from_path(
            &config.prefix,
            path,
            Envelope::from_slice(&body)?,
        ))
    }

    pub fn next_segment(&mut self) -> Option<String> {
        self.segments.pop_front()
    }

    /// Pop the next argument. An exhausted argument list yields `null` so the schema decides whether that is acceptable.
    pub fn next_arg(&mut self) -> Value {
        self.args.pop_front().unwrap_or(Value::Null)
    }

    pub fn segments(&self) -> impl ExactSizeIterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    pub fn args(&self) -> impl ExactSizeIterator<Item = &Value> {
        self.args.iter()
    }

    /// The remaining path joined with `/` and the remaining arguments re-wrapped as an envelope.
    pub fn into_remaining(self) -> (String, Envelope) {
        let path = Vec::from(self.segments).join("/");
        (path, Envelope::new(self.args.into()))
    }
}
