use fedsearch_core::{Error, Hit, Resource};
use serde_json::{json, Value};

/// Outcome class of a query, as the transport layer reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    NotFound,
    ServiceUnavailable,
}

impl Status {
    pub fn http_code(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NotFound => 404,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Unknown resources are not-found; everything else that failed is
    /// unavailable.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::UnknownResource(_) => Self::NotFound,
            Error::ResourceUnavailable(_) | Error::Storage(_) | Error::MalformedResource(_) | Error::InvalidConfig(_) => {
                Self::ServiceUnavailable
            }
        }
    }
}

/// The redacted resource and its ranked hits.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBody {
    pub resource: Resource,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub status: Status,
    pub body: Option<ResponseBody>,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn success(body: ResponseBody) -> Self {
        Self { status: Status::Success, body: Some(body), error: None }
    }

    pub fn failure(err: &Error) -> Self {
        Self { status: Status::for_error(err), body: None, error: Some(err.to_string()) }
    }

    pub fn is_success(&self) -> bool { self.status == Status::Success }

    /// `{"resource": {...}, "hits": [...]}` on success, `{"error": "..."}` otherwise.
    pub fn to_json(&self) -> Value {
        match &self.body {
            Some(body) => json!({
                "resource": body.resource.to_json(),
                "hits": body.hits.iter().map(|h| Value::Object(h.to_serializable())).collect::<Vec<_>>(),
            }),
            None => json!({ "error": self.error.clone().unwrap_or_default() }),
        }
    }
}
