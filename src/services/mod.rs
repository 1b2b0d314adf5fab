//! Storage services: the content store, the three registries layered on top
//! of it and the read-side listing facade.

pub mod artifact_registry;
pub mod content_store;
pub mod listing;
pub mod project_registry;
pub mod store;
pub mod version_registry;
