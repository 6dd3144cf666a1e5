//! Public API module.
//!
//! This module contains the user-facing client and its models.

pub mod models;
pub mod wifi_client;
