use std::fmt;

use futures::future::BoxFuture;
use typeknit::{Request, Response, Service};

use crate::Error;

/// Sends a fully built request and hands back the response with its body still streaming.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

/// Dispatches requests to a [`Service`] in the same process, no sockets involved.
///
/// ```rust
/// use typeknit::Router;
/// use typeknit_client::{Client, InProcess};
///
/// let service = Router::<()>::new().into_service(|_| ());
/// let client = Client::with_transport("http://localhost", InProcess::new(service));
/// ```
#[derive(Clone)]
pub struct InProcess<S>(S);

impl<S: Service> InProcess<S> {
    pub fn new(service: S) -> Self {
        Self(service)
    }
}

impl<S: Service> Transport for InProcess<S> {
    fn fetch(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let resp = self.0.call(req);
        Box::pin(async move { Ok(resp.await) })
    }
}

impl<S> fmt::Debug for InProcess<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InProcess(..)")
    }
}

#[cfg(feature = "reqwest")]
pub use http_transport::HttpTransport;

#[cfg(feature = "reqwest")]
mod http_transport {
    use futures::future::BoxFuture;
    use typeknit::{Body, Request, Response};

    use super::Transport;
    use crate::Error;

    /// Sends requests over the network with [`reqwest`].
    #[derive(Debug, Clone)]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub struct HttpTransport(reqwest::Client);

    impl HttpTransport {
        pub fn new() -> Self {
            Self::from_client(reqwest::Client::new())
        }

        pub fn from_client(client: reqwest::Client) -> Self {
            Self(client)
        }
    }

    impl Default for HttpTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for HttpTransport {
        fn fetch(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
            let client = self.0.clone();
            Box::pin(async move {
                let (parts, body) = req.into_parts();
                let body = body.collect(usize::MAX).await?;

                let resp = client
                    .request(parts.method, parts.uri.to_string())
                    .headers(parts.headers)
                    .body(body)
                    .send()
                    .await
                    .map_err(|err| Error::Transport(Box::new(err)))?;

                let status = resp.status();
                let headers = resp.headers().clone();
                let mut out = Response::new(Body::from_stream(resp.bytes_stream()));
                *out.status_mut() = status;
                *out.headers_mut() = headers;
                Ok(out)
            })
        }
    }
}
