//! Core library for storynook, a storytelling app for families.
//!
//! This crate is the app's data layer. The UI shells (mobile bindings and
//! the developer CLI) sit on top of it and own all presentation; nothing
//! in here renders or blocks.
//!
//! The pieces:
//! - [`cache`]: the generic cache-coherent repository (ttl freshness,
//!   in-flight fetch deduplication, optimistic mutations with rollback)
//! - [`repos`]: the five entity repositories built on it
//! - [`api`]: the typed REST client for the backend
//! - [`auth`]: guest and email sessions, the encrypted session vault, and
//!   the guest-upgrade merge rule
//! - [`safety`]: content screening with rejection as a value
//! - [`services`]: the composition root an app shell constructs once

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod repos;
pub mod safety;
pub mod services;
pub mod utils;

pub use services::Services;
