// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::WalletAuth,
    content::ContentAddress,
    error::ApiError,
    models::{ConfirmPublishRequest, PublishResponse, StartPublishRequest},
    publish::{PublishError, PublishOutcome},
    state::AppState,
};

fn respond(state: &AppState, outcome: PublishOutcome) -> (StatusCode, Json<PublishResponse>) {
    let status = outcome.status.http_status();
    (
        status,
        Json(PublishResponse::from_outcome(outcome, &state.config.gateway_base_url)),
    )
}

/// Addresses that do not parse are indistinguishable from unknown ones.
fn parse_address(raw: &str) -> Result<ContentAddress, ApiError> {
    raw.parse().map_err(|_| PublishError::UnknownAddress.into())
}

#[utoipa::path(
    post,
    path = "/v1/publish",
    request_body = StartPublishRequest,
    tag = "Publish",
    params(
        ("X-Wallet-Public-Key" = String, Header, description = "Base58 wallet public key"),
        ("X-Wallet-Signature" = String, Header, description = "Base58 Ed25519 signature of the message"),
        ("X-Wallet-Message" = String, Header, description = "Base64 of the signed challenge naming this method and path")
    ),
    responses(
        (status = 201, description = "Staged; awaiting payment", body = PublishResponse),
        (status = 200, description = "Content is already finalized", body = PublishResponse),
        (status = 401, description = "Bad wallet credentials"),
        (status = 402, description = "Insufficient funds"),
        (status = 422, description = "Tree cannot be published"),
        (status = 503, description = "Ledger unavailable")
    )
)]
pub async fn start_publish(
    State(state): State<AppState>,
    WalletAuth(identity): WalletAuth,
    Json(request): Json<StartPublishRequest>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    let tree_ref = request.tree_ref.trim();
    if tree_ref.is_empty() {
        return Err(ApiError::bad_request("tree_ref is required"));
    }

    let outcome = state.coordinator.start_publish(&identity, tree_ref).await?;
    Ok(respond(&state, outcome))
}

#[utoipa::path(
    post,
    path = "/v1/publish/{address}/confirm",
    request_body = ConfirmPublishRequest,
    tag = "Publish",
    params(
        ("address" = String, Path, description = "Content address returned by start"),
        ("X-Wallet-Public-Key" = String, Header, description = "Base58 wallet public key"),
        ("X-Wallet-Signature" = String, Header, description = "Base58 Ed25519 signature of the message"),
        ("X-Wallet-Message" = String, Header, description = "Base64 of the signed challenge naming this method and path")
    ),
    responses(
        (status = 200, description = "Finalized", body = PublishResponse),
        (status = 202, description = "Payment not finalized yet", body = PublishResponse),
        (status = 401, description = "Bad wallet credentials"),
        (status = 402, description = "Payment rejected"),
        (status = 404, description = "Unknown address"),
        (status = 410, description = "Staged content expired"),
        (status = 503, description = "Ledger unavailable")
    )
)]
pub async fn confirm_publish(
    State(state): State<AppState>,
    WalletAuth(identity): WalletAuth,
    Path(address): Path<String>,
    Json(request): Json<ConfirmPublishRequest>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    let address = parse_address(&address)?;
    let transaction_ref = request.transaction_ref.trim();
    if transaction_ref.is_empty() {
        return Err(ApiError::bad_request("transaction_ref is required"));
    }

    let outcome = state
        .coordinator
        .confirm_publish(&identity, &address, transaction_ref)
        .await?;
    Ok(respond(&state, outcome))
}

#[utoipa::path(
    get,
    path = "/v1/publish/{address}",
    tag = "Publish",
    params(
        ("address" = String, Path, description = "Content address"),
        ("X-Wallet-Public-Key" = String, Header, description = "Base58 wallet public key"),
        ("X-Wallet-Signature" = String, Header, description = "Base58 Ed25519 signature of the message"),
        ("X-Wallet-Message" = String, Header, description = "Base64 of the signed challenge naming this method and path")
    ),
    responses(
        (status = 200, description = "Awaiting payment or finalized", body = PublishResponse),
        (status = 401, description = "Bad wallet credentials"),
        (status = 404, description = "Unknown address")
    )
)]
pub async fn publish_status(
    State(state): State<AppState>,
    WalletAuth(identity): WalletAuth,
    Path(address): Path<String>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    let address = parse_address(&address)?;
    let outcome = state.coordinator.entry_status(&identity, &address)?;

    // Reading status creates nothing.
    let (status, body) = respond(&state, outcome);
    let status = if status == StatusCode::CREATED {
        StatusCode::OK
    } else {
        status
    };
    Ok((status, body))
}
