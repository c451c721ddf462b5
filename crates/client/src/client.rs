use std::{fmt, sync::Arc};

use http::{header, HeaderMap, HeaderValue, Method, Uri};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use typeknit::{Body, Envelope, Request, Response};

use crate::{Error, StreamReader, Transport};

/// Headers sent with every request made through a [`Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub headers: HeaderMap,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Entry point for calling a typeknit [`Router`](typeknit::Router).
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), typeknit_client::Error> {
/// let client = typeknit_client::Client::new("http://localhost:3000/rpc");
/// let greeting: String = client
///     .materialize()
///     .path("users")
///     .instance(&serde_json::json!({ "org": 1 }))
///     .path("greet")
///     .call(&serde_json::json!({ "name": "Bob" }))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    base_url: Arc<str>,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// A client speaking HTTP through [`reqwest`].
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_transport(base_url, crate::HttpTransport::new())
    }

    pub fn with_transport(base_url: impl AsRef<str>, transport: impl Transport) -> Self {
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').into(),
            options: ClientOptions::default(),
            transport: Arc::new(transport),
        }
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a new call chain.
    pub fn materialize(&self) -> Chain {
        self.materialize_with(HeaderMap::new())
    }

    /// Start a new call chain whose requests carry `overrides` on top of the client's headers.
    pub fn materialize_with(&self, overrides: HeaderMap) -> Chain {
        let mut headers = self.options.headers.clone();
        headers.extend(overrides);
        Chain {
            client: self.clone(),
            headers,
            segments: Vec::new(),
            args: Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Accumulates path segments and arguments until a terminal (`call` or `stream`) sends them as one request.
///
/// Arguments are only added by the argument-taking methods, so a chain must mirror which routes on the server take an argument.
pub struct Chain {
    client: Client,
    headers: HeaderMap,
    segments: Vec<String>,
    // The first encoding failure is kept and reported by the terminal.
    args: Result<Vec<Value>, serde_json::Error>,
}

impl Chain {
    pub fn path(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    pub fn push(mut self, arg: &impl Serialize) -> Self {
        if let Ok(args) = &mut self.args {
            match serde_json::to_value(arg) {
                Ok(arg) => args.push(arg),
                Err(err) => self.args = Err(err),
            }
        }
        self
    }

    /// Pass `arg` to an instance route and keep addressing routes of the instance. Nothing is sent yet.
    pub fn instance(self, arg: &impl Serialize) -> Self {
        self.push(arg)
    }

    /// Step through an instance route which takes no argument.
    pub fn instance_no_args(self) -> Self {
        self
    }

    pub async fn call<T: DeserializeOwned>(self, arg: &impl Serialize) -> Result<T, Error> {
        self.push(arg).send_call().await
    }

    pub async fn call_no_args<T: DeserializeOwned>(self) -> Result<T, Error> {
        self.send_call().await
    }

    /// Prepare a stream request. Nothing is sent until [`StreamReader::start`].
    pub fn stream(self, arg: &impl Serialize) -> Result<StreamReader, Error> {
        let chain = self.push(arg);
        let transport = chain.client.transport.clone();
        Ok(StreamReader::new(transport, chain.into_request()?))
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.client.base_url, self.segments.join("/"))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn args(&self) -> &[Value] {
        match &self.args {
            Ok(args) => args,
            Err(_) => &[],
        }
    }

    async fn send_call<T: DeserializeOwned>(self) -> Result<T, Error> {
        let transport = self.client.transport.clone();
        let resp = transport.fetch(self.into_request()?).await?;
        decode(resp).await
    }

    fn into_request(self) -> Result<Request, Error> {
        let url = self.url();
        let args = self.args.map_err(Error::Encode)?;
        let body = Envelope::new(args).to_vec().map_err(Error::Encode)?;

        let mut req = Request::new(Body::from(body));
        *req.method_mut() = Method::POST;
        *req.uri_mut() = Uri::try_from(url.as_str()).map_err(|_| Error::InvalidUrl(url))?;
        *req.headers_mut() = self.headers;
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(req)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("url", &self.url())
            .field("args", &self.args)
            .finish()
    }
}

/// Map a response onto the result contract: a success status decodes the JSON payload, anything else is an [`Error::Rpc`] carrying the body text.
pub async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    if !resp.status().is_success() {
        return Err(rpc_error(resp).await);
    }

    let body = resp.into_body().collect(usize::MAX).await?;
    serde_json::from_slice(&body).map_err(Error::Decode)
}

pub(crate) async fn rpc_error(resp: Response) -> Error {
    let status = resp.status();
    match resp.into_body().collect(usize::MAX).await {
        Ok(body) => Error::Rpc {
            status,
            message: String::from_utf8_lossy(&body).into_owned(),
        },
        Err(err) => err.into(),
    }
}
