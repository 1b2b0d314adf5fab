//! Core data models for the versioned artifact store.
//!
//! These entities represent the project → version → artifact hierarchy and
//! the content blobs artifacts point at. They map to database tables via
//! `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod artifact;
pub mod blob;
pub mod project;
pub mod version;
