//! Relational persistence for the Fabula story pipeline.
//!
//! Two tables back the data model: `stories` (the job aggregate) and
//! `scenes` (derived children, unique per `(story_id, sequence)`). Every
//! status write is guarded by the state machine in `fabula_core`; illegal
//! transitions are rejected, never silently applied.

#![forbid(unsafe_code)]

mod connection;
mod memory;
mod models;
mod postgres;
mod repository;
pub mod schema;

pub use connection::{create_pool, PgPool};
pub use memory::MemoryStoryRepository;
pub use models::{NewSceneRow, NewStoryRow, SceneRow, StoryRow};
pub use postgres::PostgresStoryRepository;
pub use repository::{ClaimOutcome, RepositoryResult, StoryRepository};
