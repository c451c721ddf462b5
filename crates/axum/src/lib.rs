//! Integrate typeknit with an [Axum](https://docs.rs/axum/latest/axum/) HTTP server.
//!
//! ```rust
//! use typeknit::{Router, Route};
//!
//! let router = Router::<()>::new()
//!     .route("version", Route::call_no_args(|_| async move { Ok(env!("CARGO_PKG_VERSION")) }));
//!
//! let app: axum::Router = axum::Router::new().nest("/rpc", typeknit_axum::endpoint(router, |_| ()));
//! ```
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::sync::Arc;

use axum::{
    body::Body as AxumBody,
    extract::Request,
    http::request::Parts,
    response::Response,
    routing::post,
};

/// Expose `router` on every path below where the returned [`axum::Router`] is mounted.
///
/// Only `POST` is routed, other methods get `405 Method Not Allowed`. When nested, axum strips the mount path so the typeknit router should keep its default `/` prefix.
pub fn endpoint<TCtx, S>(
    router: typeknit::Router<TCtx>,
    ctx_fn: impl Fn(&Parts) -> TCtx + Send + Sync + 'static,
) -> axum::Router<S>
where
    TCtx: Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    let router = Arc::new(router);
    let ctx_fn = Arc::new(ctx_fn);

    axum::Router::new().route(
        "/*path",
        post(move |req: Request| async move {
            let (parts, body) = req.into_parts();
            let ctx = ctx_fn(&parts);
            let body = typeknit::Body::from_stream(body.into_data_stream());

            let resp = router
                .dispatch(ctx, typeknit::Request::from_parts(parts, body))
                .await;

            let (parts, body) = resp.into_parts();
            Response::from_parts(parts, AxumBody::from_stream(body.into_stream()))
        }),
    )
}
