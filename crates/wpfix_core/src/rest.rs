//! Request and response types for the dispatch surface.

use crate::types::PrincipalId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        })
    }
}

/// A request routed through [`RestDispatch`](crate::RestDispatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestRequest {
    pub method: Method,
    /// Route path, e.g. `/wp/v2/posts/12`.
    pub route: String,
    pub params: BTreeMap<String, Value>,
    /// Principal the request is made as; `None` is anonymous.
    pub acting_principal: Option<PrincipalId>,
}

impl RestRequest {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
            params: BTreeMap::new(),
            acting_principal: None,
        }
    }

    pub fn get(route: impl Into<String>) -> Self {
        Self::new(Method::Get, route)
    }

    pub fn post(route: impl Into<String>) -> Self {
        Self::new(Method::Post, route)
    }

    pub fn delete(route: impl Into<String>) -> Self {
        Self::new(Method::Delete, route)
    }

    /// Add a parameter.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Make the request as the given principal.
    pub fn acting_as(mut self, principal: PrincipalId) -> Self {
        self.acting_principal = Some(principal);
        self
    }

    pub(crate) fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Interprets `true`, `"true"` and `"1"` as set.
    pub(crate) fn flag_param(&self, key: &str) -> bool {
        match self.params.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true" || s == "1",
            Some(Value::Number(n)) => n.as_u64() == Some(1),
            _ => false,
        }
    }

    /// A non-negative integer parameter. `Err` carries the key when the value
    /// is present but negative, fractional or not a number.
    pub(crate) fn uint_param(&self, key: &str) -> Result<Option<u64>, InvalidParam> {
        let parsed = match self.params.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        };
        parsed.map(Some).ok_or_else(|| InvalidParam(key.to_string()))
    }
}

/// A request parameter whose value could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InvalidParam(pub(crate) String);

impl InvalidParam {
    pub(crate) fn response(&self) -> RestResponse {
        RestResponse::error(
            400,
            "rest_invalid_param",
            &format!("Invalid parameter(s): {}", self.0),
        )
    }
}

/// Response produced by a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestResponse {
    pub status: u16,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl RestResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
        }
    }

    /// Error response in `{code, message, data: {status}}` form.
    pub fn error(status: u16, code: &str, message: &str) -> Self {
        Self::new(
            status,
            serde_json::json!({
                "code": code,
                "message": message,
                "data": { "status": status },
            }),
        )
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    /// Header value; names compare case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Error code of an error body.
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }

    /// The `id` field of the body, if it is a positive integer.
    pub fn entity_id(&self) -> Option<u64> {
        self.body
            .get("id")
            .and_then(Value::as_u64)
            .filter(|id| *id > 0)
    }
}
