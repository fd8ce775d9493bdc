//! Request extractors.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

/// A JSON object body where an absent or malformed body reads as `{}`.
///
/// Fields are validated one by one by the handler instead of failing the
/// whole request on a parse error.
#[derive(Debug, Clone, Default)]
pub struct LenientJson(pub Map<String, Value>);

impl LenientJson {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    /// The first of `fields` holding a string.
    pub fn str_field(&self, fields: &[&str]) -> Option<&str> {
        fields.iter().find_map(|f| self.get(f).and_then(Value::as_str))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[async_trait]
impl<S> FromRequest<S> for LenientJson
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Ok(Self::default()),
        }
    }
}
