// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP handlers for the datastore API.

pub mod crud;
pub mod log;
pub mod registration;
pub mod sessions;
