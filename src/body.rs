//! Transport-agnostic request and response bodies.
//!
//! A [`Body`] is either fully buffered or a stream of byte chunks. Adapters (Eg. `typeknit-axum` or `typeknit-client`'s HTTP transport) convert their own body types into and out of it.

use std::{error, fmt};

use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, Stream, StreamExt, TryStreamExt};

pub type BoxError = Box<dyn error::Error + Send + Sync>;

pub type Request = http::Request<Body>;
pub type Response = http::Response<Body>;

#[derive(thiserror::Error, Debug)]
pub enum BodyError {
    #[error("body exceeded the limit of {0} bytes")]
    LengthLimit(usize),
    #[error("error reading body: {0}")]
    Read(BoxError),
}

pub struct Body(Inner);

enum Inner {
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes, BodyError>>),
}

impl Body {
    pub fn empty() -> Self {
        Self(Inner::Full(Bytes::new()))
    }

    pub fn from_stream<S, T, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self(Inner::Stream(
            stream
                .map_ok(Into::into)
                .map_err(|err| BodyError::Read(err.into()))
                .boxed(),
        ))
    }

    /// Returns `true` if the body is backed by a stream rather than a buffer.
    pub fn is_stream(&self) -> bool {
        matches!(self.0, Inner::Stream(_))
    }

    /// Buffer the whole body, failing once more than `limit` bytes have been received.
    pub async fn collect(self, limit: usize) -> Result<Bytes, BodyError> {
        match self.0 {
            Inner::Full(bytes) if bytes.len() > limit => Err(BodyError::LengthLimit(limit)),
            Inner::Full(bytes) => Ok(bytes),
            Inner::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if buf.len() + chunk.len() > limit {
                        return Err(BodyError::LengthLimit(limit));
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, BodyError>> {
        match self.0 {
            Inner::Full(bytes) if bytes.is_empty() => futures::stream::empty().boxed(),
            Inner::Full(bytes) => futures::stream::once(async move { Ok(bytes) }).boxed(),
            Inner::Stream(stream) => stream,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Inner::Full(bytes) => f.debug_tuple("Body").field(bytes).finish(),
            Inner::Stream(_) => f.debug_tuple("Body").field(&"<stream>").finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self(Inner::Full(value))
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self(Inner::Full(value.into()))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self(Inner::Full(value.into()))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self(Inner::Full(Bytes::from_static(value.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[tokio::test]
    async fn collect_streamed_chunks() {
        let body = Body::from_stream(futures::stream::iter([
            Ok::<_, Infallible>("ab"),
            Ok("cd"),
        ]));
        assert!(body.is_stream());
        assert_eq!(body.collect(16).await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn collect_enforces_limit() {
        let body = Body::from("too long for the limit");
        assert!(matches!(
            body.collect(4).await,
            Err(BodyError::LengthLimit(4))
        ));

        let body = Body::from_stream(futures::stream::iter([
            Ok::<_, Infallible>("ab"),
            Ok("cd"),
        ]));
        assert!(matches!(
            body.collect(3).await,
            Err(BodyError::LengthLimit(3))
        ));
    }
}
