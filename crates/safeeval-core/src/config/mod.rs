//! Unified configuration layer.
//!
//! Every environment variable read goes through this module; the rest of the
//! workspace receives typed config structs instead of calling `std::env::var`.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `env_parse` helpers
//! - `schema`: `RuntimeConfig`, `ObservabilityConfig`
//! - `env_keys`: key constants and aliases

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_parse, load_dotenv, load_dotenv_from_dir};
pub use schema::{ObservabilityConfig, RuntimeConfig};
