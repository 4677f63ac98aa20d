use std::{collections::HashMap, str::FromStr};

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::errors::AppError;

/// One problem found in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    /// Field the issue refers to; empty for the body as a whole.
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_owned(),
            message: message.into(),
        }
    }
}

/// Request bodies that are checked field by field so every problem can be
/// reported at once.
pub trait Validate: Sized {
    fn validate(value: &Value) -> Result<Self, Vec<Issue>>;
}

/// JSON body extractor that answers with a structured 400 instead of axum's
/// plain-text rejections. The content type is not checked; devices are sloppy
/// about it.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge
            } else {
                AppError::invalid("", e.body_text())
            }
        })?;

        let value: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| AppError::invalid("", format!("malformed JSON: {e}")))?
        };

        T::validate(&value).map(Self).map_err(AppError::Validation)
    }
}

/// Query string counterpart of [`ValidJson`]. Every parameter reaches
/// [`Validate::validate`] as a JSON string.
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::invalid("", e.body_text()))?;

        let object: Map<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        T::validate(&Value::Object(object))
            .map(Self)
            .map_err(AppError::Validation)
    }
}

/// Reads typed fields out of a JSON object, collecting an [`Issue`] for each
/// missing or mistyped one. Each field may be known under several names; the
/// first one present wins.
pub struct Fields<'a> {
    object: &'a Map<String, Value>,
    issues: Vec<Issue>,
}

impl<'a> Fields<'a> {
    pub fn of(value: &'a Value) -> Result<Self, Vec<Issue>> {
        match value {
            Value::Object(object) => Ok(Self {
                object,
                issues: Vec::new(),
            }),
            other => Err(vec![Issue::new(
                "",
                format!("Expected object, received {}", kind(other)),
            )]),
        }
    }

    pub fn number(&mut self, names: &[&str]) -> Option<f64> {
        self.required(names, "number", Value::as_f64)
    }

    pub fn boolean(&mut self, names: &[&str]) -> Option<bool> {
        self.required(names, "boolean", Value::as_bool)
    }

    pub fn string(&mut self, names: &[&str]) -> Option<String> {
        self.required(names, "string", |v| v.as_str().map(str::to_owned))
    }

    /// Like the others, but absence (or `null`) is not an issue.
    pub fn optional_integer(&mut self, names: &[&str]) -> Option<i64> {
        let (name, value) = self.lookup(names)?;
        match value.as_i64() {
            Some(v) => Some(v),
            None => {
                self.mistyped(name, "integer", value);
                None
            }
        }
    }

    pub fn optional_string(&mut self, names: &[&str]) -> Option<String> {
        let (name, value) = self.lookup(names)?;
        match value.as_str() {
            Some(v) => Some(v.to_owned()),
            None => {
                self.mistyped(name, "string", value);
                None
            }
        }
    }

    /// An optional string field holding some other type, as query
    /// parameters do. `expected` names that type in the issue.
    pub fn optional_parsed<T: FromStr>(&mut self, names: &[&str], expected: &str) -> Option<T> {
        let (name, value) = self.lookup(names)?;
        match value.as_str().map(str::parse::<T>) {
            Some(Ok(v)) => Some(v),
            Some(Err(_)) => {
                self.push(name, format!("Expected {expected}"));
                None
            }
            None => {
                self.mistyped(name, "string", value);
                None
            }
        }
    }

    pub fn push(&mut self, path: &str, message: impl Into<String>) {
        self.issues.push(Issue::new(path, message));
    }

    /// All issues collected so far; empty means every field was read.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    fn required<T>(
        &mut self,
        names: &[&str],
        expected: &str,
        read: impl Fn(&Value) -> Option<T>,
    ) -> Option<T> {
        let Some((name, value)) = self.lookup(names) else {
            let path = names.first().copied().unwrap_or_default();
            self.push(path, "Required");
            return None;
        };
        match read(value) {
            Some(v) => Some(v),
            None => {
                self.mistyped(name, expected, value);
                None
            }
        }
    }

    fn lookup<'n>(&self, names: &[&'n str]) -> Option<(&'n str, &'a Value)> {
        names.iter().find_map(|name| match self.object.get(*name) {
            None | Some(Value::Null) => None,
            Some(v) => Some((*name, v)),
        })
    }

    fn mistyped(&mut self, name: &str, expected: &str, value: &Value) {
        self.push(name, format!("Expected {expected}, received {}", kind(value)));
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
