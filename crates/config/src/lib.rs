//! Configuration: schema types, file discovery, and `${ENV_VAR}` expansion.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::PhonotekConfig,
};
