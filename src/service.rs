use std::{fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use http::request::Parts;

use crate::{Request, Response, Router};

/// Anything which can turn a [`Request`] into a [`Response`].
///
/// This is what an instance route resolves to and what the in-process client transport drives.
pub trait Service: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Service for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        Box::pin(self(req))
    }
}

/// A [`Router`] paired with the function building its context from each request.
///
/// Created with [`Router::into_service`].
pub struct RouterService<TCtx> {
    router: Arc<Router<TCtx>>,
    make_ctx: Arc<dyn Fn(&Parts) -> TCtx + Send + Sync>,
}

impl<TCtx: Send + 'static> RouterService<TCtx> {
    pub(crate) fn new(
        router: Router<TCtx>,
        make_ctx: impl Fn(&Parts) -> TCtx + Send + Sync + 'static,
    ) -> Self {
        Self {
            router: Arc::new(router),
            make_ctx: Arc::new(make_ctx),
        }
    }

    pub fn router(&self) -> &Router<TCtx> {
        &self.router
    }
}

impl<TCtx> Clone for RouterService<TCtx> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            make_ctx: self.make_ctx.clone(),
        }
    }
}

impl<TCtx> fmt::Debug for RouterService<TCtx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterService").finish_non_exhaustive()
    }
}

impl<TCtx: Send + 'static> Service for RouterService<TCtx> {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let (parts, body) = req.into_parts();
        let ctx = (self.make_ctx)(&parts);
        let router = self.router.clone();

        Box::pin(async move { router.dispatch(ctx, Request::from_parts(parts, body)).await })
    }
}
