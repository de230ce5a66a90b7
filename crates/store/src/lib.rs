//! Typed access to the managed archive platform: relational rows over a
//! PostgREST-style API plus bucket-scoped object storage.

pub mod pagination;
pub mod rest;
pub mod rows;
pub mod traits;

pub use {
    rest::{RestObjectStore, RestStore},
    rows::*,
    traits::{ArchiveStore, ChunkIndex, ObjectStore},
};
