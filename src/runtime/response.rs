use serde::Serialize;
use serde_json::Value;

/// Outcome of a request-triggered step, ready for a transport layer.
///
/// The runner maps handler results onto three statuses: 200 with the
/// step's serialized response, 400 with a machine-readable validation
/// body, or 500 with an opaque internal-error body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    status: u16,
    body: Value,
}

impl ApiResponse {
    pub(crate) fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub(crate) fn bad_request(message: String, issues: Vec<ApiErrorIssue>) -> Self {
        let body = ApiErrorBody {
            error: ApiErrorKind::InvalidRequest,
            message,
            issues,
        };
        Self {
            status: 400,
            // ApiErrorBody serialization cannot fail: strings only.
            body: serde_json::to_value(body).unwrap_or(Value::Null),
        }
    }

    pub(crate) fn internal_error(message: String) -> Self {
        let body = ApiErrorBody {
            error: ApiErrorKind::Internal,
            message,
            issues: Vec::new(),
        };
        Self {
            status: 500,
            body: serde_json::to_value(body).unwrap_or(Value::Null),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Machine-readable error category carried in non-200 bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    InvalidRequest,
    Internal,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorKind,
    pub message: String,
    pub issues: Vec<ApiErrorIssue>,
}

/// One validation finding in a 400 body.
#[derive(Clone, Debug, Serialize)]
pub struct ApiErrorIssue {
    pub message: String,
}
