//! Axum handlers. Each one delegates to a registry on `ArtifactStore` and
//! converts `StoreError` into an HTTP response through `AppError`.

pub mod artifact_handlers;
pub mod health_handlers;
pub mod project_handlers;
pub mod version_handlers;
