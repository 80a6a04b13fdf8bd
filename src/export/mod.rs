//! Model artifact persistence
//!
//! Fitted pipelines are stored as JSON, grouped per training run and
//! published through a pointer file.

mod artifacts;

pub use artifacts::{ArtifactInfo, ArtifactStore, LocalArtifactStore, ModelArtifact};
