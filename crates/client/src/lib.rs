//! Rust client for [`typeknit`].
//!
//! Routes are addressed with an explicit [`Chain`] builder. Path segments and arguments accumulate until a terminal method sends the single request, so any number of instance hops still cost one round trip.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod decoder;
mod error;
mod stream;
mod transport;

pub use client::{decode, Chain, Client, ClientOptions};
pub use decoder::{Frame, FrameDecoder};
pub use error::Error;
pub use stream::{Canceller, ClientStreamEvent, StreamReader};
pub use transport::{InProcess, Transport};

#[cfg(feature = "reqwest")]
pub use transport::HttpTransport;
