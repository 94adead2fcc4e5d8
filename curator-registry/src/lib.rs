//! # curator-registry
//!
//! Wire document, client trait and blocking HTTP client for the external
//! registry service.
//!
//! The engine only talks to [`RegistryApi`]; [`HttpRegistry`] is the
//! production implementation.

pub mod client;
pub mod document;
pub mod error;

pub use client::{HttpRegistry, RegistryApi};
pub use document::{Receipt, RegistryDocument, CARRIED_FIELDS};
pub use error::RegistryError;
