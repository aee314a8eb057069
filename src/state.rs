// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::IdentityResolver;
use crate::config::Config;
use crate::publish::PublishCoordinator;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<PublishCoordinator>,
    pub resolver: Arc<IdentityResolver>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<PublishCoordinator>,
        resolver: Arc<IdentityResolver>,
        config: Config,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            config: Arc::new(config),
        }
    }
}
