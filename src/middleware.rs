use std::{future::Future, sync::Arc};

use futures::future::BoxFuture;
use http::request::Parts;

use crate::{Error, ExecError, Response};

/// What a middleware decided to do with a request.
#[derive(Debug)]
pub enum Flow<TCtx> {
    /// Keep dispatching with this (possibly replaced) context.
    Continue(TCtx),
    /// Stop here and send this response.
    Respond(Response),
}

impl<TCtx> Flow<TCtx> {
    /// Stop dispatching with the response for a handler-declared error.
    pub fn error(err: Error) -> Self {
        Self::Respond(ExecError::Resolver(err).into_response())
    }
}

pub(crate) type MiddlewareFn<TCtx> =
    Arc<dyn Fn(TCtx, &Parts) -> BoxFuture<'static, Flow<TCtx>> + Send + Sync>;

pub(crate) fn middleware_fn<TCtx, F, Fut>(func: F) -> MiddlewareFn<TCtx>
where
    F: Fn(TCtx, &Parts) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow<TCtx>> + Send + 'static,
{
    Arc::new(
        move |ctx: TCtx, parts: &Parts| -> BoxFuture<'static, Flow<TCtx>> {
            Box::pin(func(ctx, parts))
        },
    )
}
