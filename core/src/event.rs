//! Serverless-style invocation boundary.
//!
//! A [`FunctionEvent`] is what the hosting platform hands us; a
//! [`FunctionResponse`] is what goes back. Both use the platform's camelCase
//! field names.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::db::DbConfig;
use crate::router::{self, Method, Reply, Request};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

impl FunctionEvent {
    /// Splits `action` out of the query string; everything else stays as
    /// parameters. A missing method means `GET`.
    #[must_use]
    pub fn into_request(self) -> Request {
        let method = Method::parse(self.http_method.as_deref().unwrap_or("GET"));
        let mut query = self.query_string_parameters.unwrap_or_default();
        let action = query.remove("action").unwrap_or_default();
        Request {
            method,
            action,
            query,
            body: self.body,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl From<Reply> for FunctionResponse {
    fn from(reply: Reply) -> Self {
        let headers = reply
            .headers
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        Self {
            status_code: reply.status,
            headers,
            body: reply.body.map(|body| body.to_string()).unwrap_or_default(),
            is_base64_encoded: false,
        }
    }
}

/// Runs one event end to end.
pub fn invoke(db: &DbConfig, user_id: i64, event: FunctionEvent) -> FunctionResponse {
    let request = event.into_request();
    router::handle(db, user_id, &request).into()
}
