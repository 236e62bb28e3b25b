// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod service;

pub use service::{ConfigError, ServiceConfig, DEFAULT_MODEL_URL, DEFAULT_PORT};
