//! Chunk storage.
//!
//! Intermediate import/export artifacts live in a [`ChunkStore`]: staged
//! uploads, growing export staging files, and finished downloads. The only
//! bundled backend is [`FilesystemChunkStore`].

pub mod filesystem;
pub mod traits;

pub use filesystem::FilesystemChunkStore;
pub use traits::{ChunkArtifact, ChunkStore};
