//! typeknit: A typed RPC router with nested delegation and line-delimited event streams over HTTP.
//!
//! A [`Router`] serves a whole tree of routes from one endpoint. Every request is a `POST` whose path names the route and whose JSON body `{"args": [...]}` carries one argument per argument-taking hop.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod body;
mod config;
mod emitter;
mod envelope;
mod error;
mod event_stream;
mod middleware;
mod route;
mod router;
mod schema;
mod service;

pub use body::{Body, BodyError, BoxError, Request, Response};
pub use config::{Config, DEFAULT_BODY_LIMIT};
pub use emitter::{Emitter, StreamEvent, Subscription};
pub use envelope::{Cursor, Envelope};
pub use error::{err, ok, Error, ErrorCode, ExecError, Result};
pub use event_stream::{encode_frame, event_stream, EventBridge, EventStream, Publisher};
pub use middleware::Flow;
pub use route::{Route, Routes, StreamTopic};
pub use router::Router;
pub use schema::{schema_fn, Json, Schema, SchemaFn, ValidationError};
pub use service::{RouterService, Service};
