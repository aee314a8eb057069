// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize` or `Deserialize`, and
//! `ToSchema`, for automatic JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Requests**: start and confirm a publish cycle
//! - **Responses**: one shape for every publish status

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::publish::{PublishOutcome, PublishStatus};

// =============================================================================
// Request Models
// =============================================================================

/// Request to start a publish cycle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartPublishRequest {
    /// Name of the tree to publish (a repository directory name).
    pub tree_ref: String,
}

/// Request to confirm payment for staged content.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPublishRequest {
    /// Base58 signature of the payment transaction.
    pub transaction_ref: String,
}

// =============================================================================
// Response Models
// =============================================================================

/// State of a publish cycle as reported to the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublishResponse {
    pub status: PublishStatus,
    /// CIDv0 address of the content (`Qm…`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_address: Option<String>,
    /// Gateway link once finalized; relative to this service by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_ref: Option<String>,
    /// Present on `finalized`: whether payment happened before this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_finalized: Option<bool>,
    /// Correlation id for logs and audit records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<Uuid>,
    /// Human-readable explanation for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishResponse {
    /// Response for a successful step; `gateway_base` builds the gateway URL.
    pub fn from_outcome(outcome: PublishOutcome, gateway_base: &str) -> Self {
        let finalized = outcome.status == PublishStatus::Finalized;
        let address = outcome.address.to_string();
        Self {
            status: outcome.status,
            gateway_url: finalized.then(|| format!("{gateway_base}/ipfs/{address}")),
            content_address: Some(address),
            tree_ref: outcome.tree_ref,
            already_finalized: finalized.then_some(outcome.already_finalized),
            cycle_id: Some(outcome.cycle_id),
            error: None,
        }
    }
}
