use std::{borrow::Cow, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use http::{header, request::Parts, HeaderValue, StatusCode, Uri};

use crate::{
    error::build,
    middleware::{middleware_fn, MiddlewareFn},
    Body, Config, Cursor,
    Emitter, EventBridge, ExecError, Flow, Request, Response, Route, RouterService, Routes,
    Service, StreamEvent, StreamTopic,
};

/// A tree of routes served from a single endpoint.
///
/// ```rust
/// use serde_json::Value;
/// use typeknit::{Json, Route, Router};
///
/// let router = Router::<()>::new()
///     .route("echo", Route::call(Json::<Value>::new(), |_, args| async move { Ok(args) }))
///     .route("version", Route::call_no_args(|_| async move { Ok("0.1.0") }));
/// ```
pub struct Router<TCtx> {
    config: Config,
    middleware: Vec<MiddlewareFn<TCtx>>,
    routes: Routes<TCtx>,
    emitter: Emitter,
}

impl<TCtx: Send + 'static> Default for Router<TCtx> {
    fn default() -> Self {
        Self {
            config: Config::new(),
            middleware: Vec::new(),
            routes: Routes::new(),
            emitter: Emitter::new(),
        }
    }
}

impl<TCtx> Router<TCtx> {
    pub fn routes(&self) -> &Routes<TCtx> {
        &self.routes
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// The emitter stream routes of this router subscribe to, including those of any router nested with [`Route::router`].
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn emit(&self, topic: &str, event: StreamEvent) {
        self.emitter.emit(topic, event);
    }
}

impl<TCtx: Send + 'static> Router<TCtx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.config = self.config.prefix(prefix);
        self
    }

    /// Share an emitter, Eg. with other routers or with code outside of any handler.
    pub fn with_emitter(mut self, emitter: Emitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Run `func` before any route. Middleware runs in the order it was added.
    pub fn middleware<F, Fut>(mut self, func: F) -> Self
    where
        F: Fn(TCtx, &Parts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Flow<TCtx>> + Send + 'static,
    {
        self.middleware.push(middleware_fn(func));
        self
    }

    pub fn route(mut self, name: impl Into<Cow<'static, str>>, route: Route<TCtx>) -> Self {
        self.routes.insert(name, route);
        self
    }

    pub fn into_service(
        self,
        make_ctx: impl Fn(&Parts) -> TCtx + Send + Sync + 'static,
    ) -> RouterService<TCtx> {
        RouterService::new(self, make_ctx)
    }

    /// Route `req` and turn the outcome into a response. This never fails, errors become their HTTP representation.
    pub async fn dispatch(&self, ctx: TCtx, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        match self.exec(&self.emitter, ctx, &parts, Pending::Body(body)).await {
            Ok(resp) => resp,
            Err(err) => {
                #[cfg(feature = "tracing")]
                if let ExecError::Resolver(err) = &err {
                    tracing::debug!("handler for '{}' returned {}", parts.uri.path(), err);
                }

                err.into_response()
            }
        }
    }

    fn exec<'a>(
        &'a self,
        emitter: &'a Emitter,
        mut ctx: TCtx,
        parts: &'a Parts,
        pending: Pending,
    ) -> BoxFuture<'a, Result<Response, ExecError>> {
        Box::pin(async move {
            for middleware in &self.middleware {
                match middleware(ctx, parts).await {
                    Flow::Continue(next) => ctx = next,
                    Flow::Respond(resp) => return Ok(resp),
                }
            }

            let mut cursor = match pending {
                Pending::Cursor(cursor) => cursor,
                Pending::Body(body) => {
                    let cursor = Cursor::from_request(&self.config, parts.uri.path(), body)
                        .await
                        .map_err(|err| {
                            #[cfg(feature = "tracing")]
                            tracing::debug!("rejecting request to '{}': {}", parts.uri.path(), err);
                            err
                        })?;

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "dispatching '{}' with {} arguments",
                        parts.uri.path(),
                        cursor.args().len()
                    );

                    cursor
                }
            };

            let mut routes = &self.routes;
            loop {
                let Some(segment) = cursor.next_segment() else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("path '{}' ended before reaching a route", parts.uri.path());
                    return Err(ExecError::RouteNotFound);
                };
                let Some(route) = routes.get(&segment) else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("no route '{}' for path '{}'", segment, parts.uri.path());
                    return Err(ExecError::RouteNotFound);
                };

                match route {
                    Route::Call(call) => {
                        let data = call(ctx, &mut cursor).await?;
                        let body = serde_json::to_vec(&data).map_err(ExecError::SerializeResult)?;
                        return Ok(build(StatusCode::OK, "application/json", body.into()));
                    }
                    Route::Stream(stream) => {
                        let topic = stream(ctx, &mut cursor).await?;
                        return Ok(subscribe(emitter, topic));
                    }
                    Route::Instance(instance) => {
                        let target = instance(ctx, &mut cursor).await?;
                        return forward(target, parts, cursor).await;
                    }
                    Route::Router(router) => {
                        return router.exec(emitter, ctx, parts, Pending::Cursor(cursor)).await;
                    }
                    Route::Group(nested) => routes = nested,
                }
            }
        })
    }
}

fn subscribe(emitter: &Emitter, StreamTopic { topic, init_value }: StreamTopic) -> Response {
    let bridge = EventBridge::new();
    let publisher = bridge.publisher();

    // Something is always sent first so the client can tell it is connected.
    publisher.publish(init_value.map_or(StreamEvent::Ping, StreamEvent::Data));

    let subscription = emitter.subscribe(topic, move |event| publisher.publish(event.clone()));
    let stream = bridge.into_stream(move || subscription.unsubscribe());

    let mut resp = build(StatusCode::OK, "text/event-stream", stream.into_body());
    let headers = resp.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    resp
}

enum Pending {
    Body(Body),
    Cursor(Cursor),
}

/// Re-encode what is left of the request and hand it to `target`.
async fn forward(
    target: Arc<dyn Service>,
    parts: &Parts,
    cursor: Cursor,
) -> Result<Response, ExecError> {
    let (path, envelope) = cursor.into_remaining();
    let body = envelope.to_vec().map_err(ExecError::SerializeResult)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "forwarding '/{}' with {} arguments to instance",
        path,
        envelope.args.len()
    );

    let mut req = Request::new(Body::from(body));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = Uri::try_from(format!("/{path}")).map_err(|_| ExecError::BadRequest)?;
    *req.version_mut() = parts.version;
    *req.headers_mut() = parts.headers.clone();
    req.headers_mut().remove(header::CONTENT_LENGTH);

    Ok(target.call(req).await)
}

impl<TCtx> fmt::Debug for Router<TCtx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::Json;

    async fn send(router: &Router<()>, path: &str, body: &'static str) -> (StatusCode, String) {
        let req = http::Request::post(path).body(Body::from(body)).unwrap();
        let resp = router.dispatch((), req).await;
        let status = resp.status();
        let body = resp.into_body().collect(usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn echo() -> Route<()> {
        Route::call(Json::<Value>::new(), |_, args| async move { Ok(args) })
    }

    #[tokio::test]
    async fn groups_descend_without_consuming_arguments() {
        let router = Router::new().route("a", Route::group(Routes::new().route("b", echo())));

        assert_eq!(
            send(&router, "/a/b", r#"{"args":[{"x":1}]}"#).await,
            (StatusCode::OK, r#"{"x":1}"#.into())
        );
        assert_eq!(
            send(&router, "/a", r#"{"args":[]}"#).await,
            (StatusCode::NOT_FOUND, "route not found".into())
        );
    }

    #[tokio::test]
    async fn prefix_is_stripped() {
        let router = Router::new().prefix("/api").route("echo", echo());

        assert_eq!(
            send(&router, "/api/echo", r#"{"args":[1]}"#).await,
            (StatusCode::OK, "1".into())
        );
        assert_eq!(
            send(&router, "/echo", r#"{"args":[1]}"#).await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn body_limit_is_enforced() {
        let router = Router::new()
            .config(Config::new().body_limit(8))
            .route("echo", echo());

        assert_eq!(
            send(&router, "/echo", r#"{"args":["way too long"]}"#).await.0,
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn middleware_can_replace_context_or_respond() {
        let router = Router::<u32>::new()
            .middleware(|ctx, parts| {
                let denied = parts.headers.contains_key("x-deny");
                async move {
                    if denied {
                        Flow::error(crate::Error::with_status(401, "denied"))
                    } else {
                        Flow::Continue(ctx + 1)
                    }
                }
            })
            .middleware(|ctx, _| async move { Flow::Continue(ctx * 10) })
            .route("ctx", Route::call_no_args(|ctx| async move { Ok(ctx) }));

        let req = http::Request::post("/ctx").body(Body::from("{}")).unwrap();
        let resp = router.dispatch(1, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&resp.into_body().collect(64).await.unwrap()[..], b"20");

        let req = http::Request::post("/ctx")
            .header("x-deny", "1")
            .body(Body::from("{}"))
            .unwrap();
        let resp = router.dispatch(1, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(&resp.into_body().collect(64).await.unwrap()[..], b"denied");
    }

    #[tokio::test]
    async fn nested_router_runs_its_own_middleware() {
        let inner = Router::<u32>::new()
            .middleware(|ctx, _| async move { Flow::Continue(ctx + 100) })
            .route("ctx", Route::call_no_args(|ctx| async move { Ok(ctx) }));
        let router = Router::<u32>::new().route("inner", Route::router(inner));

        let req = http::Request::post("/inner/ctx")
            .body(Body::from("{}"))
            .unwrap();
        let resp = router.dispatch(1, req).await;
        assert_eq!(&resp.into_body().collect(64).await.unwrap()[..], b"101");
    }

    #[test]
    fn debug_lists_routes() {
        let router = Router::<()>::new().route("echo", echo());
        assert!(format!("{router:?}").contains("\"echo\": Call"));
        assert_eq!(router.routes().names().collect::<Vec<_>>(), ["echo"]);
    }
}
