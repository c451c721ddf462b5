//! Support for [`validator`] with [`typeknit`] for easy argument validation.
//!
//! ```rust
//! use serde::Deserialize;
//! use typeknit::{Route, Router};
//! use typeknit_validator::Validated;
//! use validator::Validate;
//!
//! #[derive(Deserialize, Validate)]
//! struct SignUp {
//!     #[validate(email)]
//!     email: String,
//! }
//!
//! let router = Router::<()>::new().route(
//!     "signUp",
//!     Route::call(Validated::<SignUp>::new(), |_, args| async move { Ok(args.email) }),
//! );
//! ```
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{fmt, marker::PhantomData};

use futures::future::{ready, BoxFuture};
use serde::{de::DeserializeOwned, ser::SerializeStruct, Serialize};
use serde_json::Value;
use typeknit::{Schema, ValidationError};
use validator::{Validate, ValidationErrors};

/// A [`Schema`] which deserializes into `T` and then runs its [`Validate`] rules.
pub struct Validated<T>(PhantomData<fn() -> T>);

impl<T> Validated<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Validated<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Validated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validated")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned + Validate + Send + 'static> Schema for Validated<T> {
    type Output = T;

    fn parse(&self, raw: Value) -> BoxFuture<'static, Result<T, ValidationError>> {
        Box::pin(ready(parse(raw)))
    }
}

fn parse<T: DeserializeOwned + Validate>(raw: Value) -> Result<T, ValidationError> {
    let value: T = serde_json::from_value(raw)
        .map_err(|err| ValidationError::new(ValidatorError::Deserialize(err.to_string())))?;
    value
        .validate()
        .map_err(|err| ValidationError::new(ValidatorError::Invalid(err)))?;
    Ok(value)
}

/// The payload sent to the client when validation fails.
#[derive(Debug, Clone)]
pub enum ValidatorError {
    Deserialize(String),
    Invalid(ValidationErrors),
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deserialize(message) => f.write_str(message),
            Self::Invalid(errors) => write!(f, "{errors}"),
        }
    }
}

impl std::error::Error for ValidatorError {}

impl Serialize for ValidatorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("ValidatorError", 2)?;
        s.serialize_field("~typeknit.validator", &true)?;
        match self {
            Self::Deserialize(message) => s.serialize_field("message", message)?,
            Self::Invalid(errors) => s.serialize_field("errors", &errors.field_errors())?,
        }
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct SignUp {
        #[validate(email)]
        email: String,
        #[validate(range(min = 18))]
        age: u8,
    }

    #[tokio::test]
    async fn valid_arguments_pass() {
        let args = Validated::<SignUp>::new()
            .parse(json!({"email": "bob@example.com", "age": 30}))
            .await
            .unwrap();
        assert_eq!(args.email, "bob@example.com");
        assert_eq!(args.age, 30);
    }

    #[tokio::test]
    async fn failed_rules_are_reported_by_field() {
        let err = Validated::<SignUp>::new()
            .parse(json!({"email": "bob", "age": 12}))
            .await
            .unwrap_err();

        assert_eq!(err.0["~typeknit.validator"], json!(true));
        assert_eq!(err.0["errors"]["email"][0]["code"], json!("email"));
        assert_eq!(err.0["errors"]["age"][0]["code"], json!("range"));
    }

    #[tokio::test]
    async fn malformed_arguments_carry_the_serde_message() {
        let err = Validated::<SignUp>::new()
            .parse(json!({"email": "bob@example.com"}))
            .await
            .unwrap_err();

        assert!(err.0["message"]
            .as_str()
            .unwrap()
            .contains("missing field `age`"));
    }
}
