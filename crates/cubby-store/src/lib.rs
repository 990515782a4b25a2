//! Single-file-per-key datastore with optional encryption at rest.
//!
//! Each key owns one file under `root/namespace/`; access to a key is
//! serialized by an in-process lock that the fetched handle carries until it
//! is dropped. There is no cross-process coordination: two processes sharing
//! a root directory can corrupt each other's writes.

pub mod datafile_store;
pub mod disk_repository;
pub mod encryption;
pub mod lock_registry;
