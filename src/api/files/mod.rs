// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Serves previously uploaded files from the upload directory

pub mod handler;

pub use handler::uploaded_file_handler;
