//! REST API client module for the storynook backend.
//!
//! This module provides the `BackendClient` for communicating with the
//! backend to fetch story, character, template, favorite and coin data.
//!
//! The API uses bearer token authentication; tokens come from the guest
//! and sign-in identity endpoints and are installed by the auth manager.

pub mod client;
pub mod error;

pub use client::{BackendClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
