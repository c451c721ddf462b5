//! The argument validation capability consumed by routes.
//!
//! typeknit never validates arguments itself. A route owns a [`Schema`] and the dispatcher hands it the raw JSON argument popped off the envelope.
//! If parsing fails the schema's error payload is sent back to the caller untouched as a `400 Bad Request`.

use std::{fmt, marker::PhantomData};

use futures::future::{ready, BoxFuture};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// The error payload of a failed validation. It is serialized verbatim into the response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub Value);

impl ValidationError {
    pub fn new(payload: impl Serialize) -> Self {
        Self(serde_json::to_value(payload).unwrap_or_else(|err| Value::String(err.to_string())))
    }
}

pub trait Schema: Send + Sync + 'static {
    type Output: Send + 'static;

    fn parse(&self, raw: Value) -> BoxFuture<'static, Result<Self::Output, ValidationError>>;
}

/// A [`Schema`] which is just `serde` deserialization into `T`.
///
/// The error payload is the deserializer's message as a JSON string.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Json")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned + Send + 'static> Schema for Json<T> {
    type Output = T;

    fn parse(&self, raw: Value) -> BoxFuture<'static, Result<T, ValidationError>> {
        Box::pin(ready(
            serde_json::from_value(raw).map_err(|err| ValidationError(Value::String(err.to_string()))),
        ))
    }
}

/// Build a [`Schema`] from a synchronous closure.
///
/// ```rust
/// use typeknit::{schema_fn, ValidationError};
///
/// let even = schema_fn(|raw| match raw.as_u64() {
///     Some(n) if n % 2 == 0 => Ok(n),
///     _ => Err(ValidationError::new("expected an even number")),
/// });
/// ```
pub fn schema_fn<F, T>(func: F) -> SchemaFn<F, T>
where
    F: Fn(Value) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    SchemaFn(func, PhantomData)
}

pub struct SchemaFn<F, T>(F, PhantomData<fn() -> T>);

impl<F, T> Schema for SchemaFn<F, T>
where
    F: Fn(Value) -> Result<T, ValidationError> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn parse(&self, raw: Value) -> BoxFuture<'static, Result<T, ValidationError>> {
        Box::pin(ready((self.0)(raw)))
    }
}
