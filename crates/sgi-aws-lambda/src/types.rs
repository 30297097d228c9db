//! Wire types for the API Gateway proxy integration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An API Gateway proxy event, as delivered to the Lambda function.
///
/// The gateway serializes optional mappings as `null` rather than
/// omitting them; both forms deserialize to `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    /// HTTP method verb, e.g. `"GET"`. Never empty.
    pub http_method: String,
    /// Request path as received by the gateway.
    pub path: String,
    /// Query parameters, when the request carried any.
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    /// Request headers, when the gateway supplied any.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Raw request body text, if any.
    #[serde(default)]
    pub body: Option<String>,
}

/// The response value handed back to API Gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    /// Numeric HTTP status.
    pub status_code: u16,
    /// Response headers as a flat mapping.
    pub headers: HashMap<String, String>,
    /// Complete response body.
    pub body: String,
}
