//! Domain layer for the pipeline-and-plugin-scheduler core.
//!
//! Holds the entities, value objects, domain services, and repository
//! ports that the application layer (`meta_core`) orchestrates. Nothing in
//! this crate depends on tokio's runtime, HTTP, or Docker directly — those
//! live behind the traits in [`services`] and [`repositories`].

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use error::{CoreError, CoreResult};
