use std::{borrow::Cow, collections::HashMap, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::{Cursor, ExecError, Result, Router, Schema, Service};

type CallFuture = BoxFuture<'static, Result<Value, ExecError>>;
type StreamFuture = BoxFuture<'static, Result<StreamTopic, ExecError>>;
type InstanceFuture = BoxFuture<'static, Result<Arc<dyn Service>, ExecError>>;

// Each of these pops its argument off the cursor synchronously, only the validation and handler run in the returned future.
pub(crate) type CallFn<TCtx> = Arc<dyn Fn(TCtx, &mut Cursor) -> CallFuture + Send + Sync>;
pub(crate) type StreamFn<TCtx> = Arc<dyn Fn(TCtx, &mut Cursor) -> StreamFuture + Send + Sync>;
pub(crate) type InstanceFn<TCtx> = Arc<dyn Fn(TCtx, &mut Cursor) -> InstanceFuture + Send + Sync>;

/// What a stream handler resolves to: the topic to subscribe to and optionally the first payload to send.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTopic {
    pub topic: String,
    pub init_value: Option<Value>,
}

impl StreamTopic {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            init_value: None,
        }
    }

    pub fn with_init(mut self, value: Value) -> Self {
        self.init_value = Some(value);
        self
    }
}

/// One node of the route tree.
pub enum Route<TCtx> {
    Call(CallFn<TCtx>),
    Stream(StreamFn<TCtx>),
    Instance(InstanceFn<TCtx>),
    Router(Arc<Router<TCtx>>),
    Group(Routes<TCtx>),
}

impl<TCtx: Send + 'static> Route<TCtx> {
    /// A call which validates one argument with `schema` before running `handler`.
    pub fn call<S, F, Fut, T>(schema: S, handler: F) -> Self
    where
        S: Schema,
        F: Fn(TCtx, S::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize,
    {
        let handler = Arc::new(handler);
        Self::Call(Arc::new(move |ctx: TCtx, cursor: &mut Cursor| -> CallFuture {
            let arg = schema.parse(cursor.next_arg());
            let handler = handler.clone();
            Box::pin(async move {
                let arg = arg.await.map_err(|err| ExecError::Validation(err.0))?;
                serialize(handler(ctx, arg).await?)
            })
        }))
    }

    /// A call which takes no argument and leaves the argument list untouched.
    pub fn call_no_args<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(TCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize,
    {
        let handler = Arc::new(handler);
        Self::Call(Arc::new(move |ctx: TCtx, _: &mut Cursor| -> CallFuture {
            let handler = handler.clone();
            Box::pin(async move { serialize(handler(ctx).await?) })
        }))
    }

    /// A stream. Streams always take an argument, at the very least it selects the topic.
    pub fn stream<S, F, Fut>(schema: S, handler: F) -> Self
    where
        S: Schema,
        F: Fn(TCtx, S::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StreamTopic>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::Stream(Arc::new(move |ctx: TCtx, cursor: &mut Cursor| -> StreamFuture {
            let arg = schema.parse(cursor.next_arg());
            let handler = handler.clone();
            Box::pin(async move {
                let arg = arg.await.map_err(|err| ExecError::Validation(err.0))?;
                Ok(handler(ctx, arg).await?)
            })
        }))
    }

    /// Delegate the rest of the request to the [`Service`] `handler` resolves to.
    pub fn instance<S, F, Fut, D>(schema: S, handler: F) -> Self
    where
        S: Schema,
        F: Fn(TCtx, S::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: Service,
    {
        let handler = Arc::new(handler);
        Self::Instance(Arc::new(move |ctx: TCtx, cursor: &mut Cursor| -> InstanceFuture {
            let arg = schema.parse(cursor.next_arg());
            let handler = handler.clone();
            Box::pin(async move {
                let arg = arg.await.map_err(|err| ExecError::Validation(err.0))?;
                let target: Arc<dyn Service> = Arc::new(handler(ctx, arg).await?);
                Ok(target)
            })
        }))
    }

    pub fn instance_no_args<F, Fut, D>(handler: F) -> Self
    where
        F: Fn(TCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: Service,
    {
        let handler = Arc::new(handler);
        Self::Instance(Arc::new(move |ctx: TCtx, _: &mut Cursor| -> InstanceFuture {
            let handler = handler.clone();
            Box::pin(async move {
                let target: Arc<dyn Service> = Arc::new(handler(ctx).await?);
                Ok(target)
            })
        }))
    }

    /// Nest a whole router. It runs its own middleware but shares the request's cursor, and its streams subscribe to the emitter of the router the request arrived at.
    pub fn router(router: Router<TCtx>) -> Self {
        Self::Router(Arc::new(router))
    }

    pub fn group(routes: Routes<TCtx>) -> Self {
        Self::Group(routes)
    }
}

fn serialize<T: Serialize>(data: T) -> Result<Value, ExecError> {
    serde_json::to_value(data).map_err(ExecError::SerializeResult)
}

impl<TCtx> fmt::Debug for Route<TCtx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(_) => write!(f, "Call"),
            Self::Stream(_) => write!(f, "Stream"),
            Self::Instance(_) => write!(f, "Instance"),
            Self::Router(router) => f.debug_tuple("Router").field(router.routes()).finish(),
            Self::Group(routes) => f.debug_tuple("Group").field(routes).finish(),
        }
    }
}

/// A named mapping of routes, one level of the route tree.
pub struct Routes<TCtx>(HashMap<Cow<'static, str>, Route<TCtx>>);

impl<TCtx> Default for Routes<TCtx> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<TCtx> Routes<TCtx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. A later route with the same name replaces the earlier one.
    pub fn route(mut self, name: impl Into<Cow<'static, str>>, route: Route<TCtx>) -> Self {
        self.insert(name, route);
        self
    }

    pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, route: Route<TCtx>) {
        let name = name.into();
        #[cfg(feature = "tracing")]
        if self.0.contains_key(&name) {
            tracing::warn!("route '{}' was registered twice, keeping the latest", name);
        }
        self.0.insert(name, route);
    }

    pub fn get(&self, name: &str) -> Option<&Route<TCtx>> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|name| name.as_ref())
    }
}

impl<TCtx> fmt::Debug for Routes<TCtx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}
