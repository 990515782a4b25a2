//! Core abstractions for Cubby: record domain types, error taxonomy, and the
//! typed key-value repository contract. This crate is intentionally small to
//! keep dependency surface minimal.

pub mod error;
pub mod record;
pub mod repository;
