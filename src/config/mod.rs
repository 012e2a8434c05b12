//! Configuration file loading and merging into CLI arguments.
mod apply;
mod loader;
pub mod types;


pub use apply::{apply_config, transmission_params};
pub use loader::{DEFAULT_CONFIG_FILES, load_config};

#[cfg(test)]
pub(crate) use loader::load_config_file;
