// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP clients for the wgfleet datastore API.

pub mod crud;
pub mod http;
pub mod remote;

pub use crud::CrudClient;
pub use remote::RemoteLogSource;
