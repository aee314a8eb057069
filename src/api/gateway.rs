// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::{content::ContentAddress, error::ApiError, publish::PublishError, state::AppState};

/// Blocks never change under an address.
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

#[utoipa::path(
    get,
    path = "/ipfs/{address}",
    tag = "Gateway",
    params(("address" = String, Path, description = "Content address of finalized content")),
    responses(
        (status = 200, description = "Canonical archive bytes as application/octet-stream"),
        (status = 404, description = "Unknown or unpaid address")
    )
)]
pub async fn serve_block(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let address: ContentAddress = address
        .parse()
        .map_err(|_| ApiError::from(PublishError::UnknownAddress))?;
    let bytes = state.coordinator.published_content(&address).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CACHE_CONTROL, IMMUTABLE.to_string()),
            (header::ETAG, format!("\"{address}\"")),
        ],
        bytes,
    ))
}
