//! Command handlers module.
//!
//! - `io.rs`: Export and import commands
//! - `gc.rs`: Chunk sweep commands (one-shot and scheduled)
//! - `config.rs`: Configuration display command

mod config;
mod gc;
mod io;

use std::path::PathBuf;

pub use config::cmd_config;
pub use gc::{cmd_clear_chunks, cmd_schedule};
pub use io::{cmd_export, cmd_import};

/// The table a command reads from or writes to.
pub struct TableArgs {
    /// Entity name the table is registered under.
    pub entity: String,
    /// JSON-lines file backing the table.
    pub path: PathBuf,
    /// Key column.
    pub key: String,
}

impl TableArgs {
    /// Bundles table arguments.
    pub const fn new(entity: String, path: PathBuf, key: String) -> Self {
        Self { entity, path, key }
    }
}
