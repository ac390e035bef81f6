//! Calling conventions recovered from legacy `outputSchema` blocks.
//!
//! Legacy requirements may embed a description of how to call the paid
//! endpoint:
//!
//! ```json
//! "outputSchema": {
//!   "input": { "type": "http", "method": "post", "bodyFields": { "city": "string" } },
//!   "output": { "temperature": "number" }
//! }
//! ```
//!
//! [`DiscoveryInfo`] turns that into the forward-compatible shape current
//! servers publish:
//!
//! ```json
//! {
//!   "input": { "type": "http", "method": "POST", "bodyType": "json", "body": { "city": "string" } },
//!   "output": { "type": "json", "example": { "temperature": "number" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::proto::v1;

/// Methods that carry a request body.
pub const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

const HTTP_INPUT: &str = "http";
const JSON_OUTPUT: &str = "json";

/// How to call an HTTP endpoint.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpInput {
    /// Always `"http"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Upper-cased HTTP method.
    pub method: String,
    /// Body encoding; set exactly when `body` is.
    pub body_type: Option<String>,
    /// Body field descriptions, only for [`BODY_METHODS`].
    pub body: Option<Value>,
    /// Query parameter descriptions.
    pub query_params: Option<Value>,
    /// Header descriptions.
    pub header_fields: Option<Value>,
}

/// Example response, tagged with its content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    /// Content type tag, `"json"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The declared output.
    pub example: Value,
}

/// Machine-readable calling convention of a paid endpoint.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// Request shape.
    pub input: HttpInput,
    /// Response shape, if declared.
    pub output: Option<OutputDescriptor>,
}

impl DiscoveryInfo {
    /// Extracts the calling convention of a legacy requirement.
    ///
    /// Returns `None` when the requirement has no `outputSchema`; see
    /// [`from_output_schema`](Self::from_output_schema) for the other cases.
    #[must_use]
    pub fn from_legacy(requirements: &v1::PaymentRequirements) -> Option<Self> {
        requirements
            .output_schema
            .as_ref()
            .and_then(Self::from_output_schema)
    }

    /// Extracts a calling convention from a legacy `outputSchema` value.
    ///
    /// Returns `None` unless `input.type` is `"http"` and `input.method` is a
    /// non-empty string, or when `input.discoverable` is `false`.
    #[must_use]
    pub fn from_output_schema(schema: &Value) -> Option<Self> {
        let input = schema.get("input")?;
        let is_http = input
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| kind.eq_ignore_ascii_case(HTTP_INPUT));
        if !is_http {
            return None;
        }
        if input.get("discoverable").and_then(Value::as_bool) == Some(false) {
            return None;
        }
        let method = input
            .get("method")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|method| !method.is_empty())?
            .to_ascii_uppercase();

        let body = if BODY_METHODS.contains(&method.as_str()) {
            present(input, "bodyFields").or_else(|| present(input, "body"))
        } else {
            None
        };
        let body_type = body.as_ref().map(|_| {
            input
                .get("bodyType")
                .and_then(Value::as_str)
                .unwrap_or(JSON_OUTPUT)
                .to_owned()
        });

        let output = present(schema, "output").map(|example| OutputDescriptor {
            kind: JSON_OUTPUT.to_owned(),
            example,
        });

        Some(Self {
            input: HttpInput {
                kind: HTTP_INPUT.to_owned(),
                method,
                body_type,
                body,
                query_params: present(input, "queryParams"),
                header_fields: present(input, "headerFields"),
            },
            output,
        })
    }
}

fn present(object: &Value, field: &str) -> Option<Value> {
    object.get(field).filter(|value| !value.is_null()).cloned()
}
