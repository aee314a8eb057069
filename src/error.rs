// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::publish::{PublishError, PublishStatus};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable status string (`snake_case`).
    pub code: String,
    pub message: String,
    pub content_address: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    status: String,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_address: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            content_address: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

impl From<PublishError> for ApiError {
    fn from(e: PublishError) -> Self {
        let status = e.status();
        let message = match &e {
            // Store and database details stay in the logs.
            PublishError::StagingFailed(_) => "content could not be staged".to_string(),
            other => other.to_string(),
        };
        Self {
            status: status.http_status(),
            code: status_code_string(status),
            message,
            content_address: e.address().map(ToString::to_string),
        }
    }
}

fn status_code_string(status: PublishStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{status:?}"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            status: self.code,
            error: self.message,
            content_address: self.content_address,
        });
        (self.status, body).into_response()
    }
}
