// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Missing headers, undecodable values and failed signature checks all
/// collapse into `BadCredentials`, so a caller cannot tell which part of a
/// challenge was wrong or whether a key is known.
#[derive(Debug)]
pub enum AuthError {
    /// The wallet challenge did not verify
    BadCredentials,
    /// Identity storage failed
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    status: &'static str,
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::BadCredentials => "bad_credentials",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::BadCredentials => write!(f, "Wallet credentials are invalid"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AuthError::Internal(msg) = &self {
            tracing::error!(error = %msg, "Identity resolution failed");
        }
        let body = Json(AuthErrorBody {
            status: match &self {
                AuthError::BadCredentials => "bad_credentials",
                AuthError::Internal(_) => "internal_error",
            },
            // Internal details stay in the logs.
            error: match &self {
                AuthError::BadCredentials => self.to_string(),
                AuthError::Internal(_) => "Internal authentication error".to_string(),
            },
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
