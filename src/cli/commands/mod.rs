pub mod config;
pub mod evaluate;
pub mod generate;

use std::path::Path;

use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// An explicit `--config` file replaces the global/project lookup
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}
