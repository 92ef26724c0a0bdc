//! Infrastructure layer - external adapters (database, filesystem, processes).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod decrypt;
pub mod output_writer;
pub mod prior_export;
pub mod signal_paths;
pub mod sqlite_reader;

pub use config::{load_config, DEFAULT_CONFIG};
pub use decrypt::{Decryptor, PreDecrypted, SqlcipherCli};
pub use signal_paths::SignalPaths;
pub use sqlite_reader::SignalDbReader;
