//! Configuration loading and application bootstrap for codectx.

pub mod bootstrap;
pub mod config;

pub use bootstrap::{build_context, create_embedder, create_index, resolve_config_path};
pub use config::Config;
