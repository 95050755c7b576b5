//! Response definitions, materialization and chunking.
//!
//! # Module Structure
//!
//! - `definition` - declared responses (`ResponseDefinition`, `ResponseBody`, `ChunkingConfig`)
//! - `materializer` - encoding into the outbound `Reply`
//! - `chunker` - splitting payloads into transport chunks

mod chunker;
mod definition;
mod materializer;

pub use chunker::chunk;
pub use definition::{ChunkingConfig, ResponseBody, ResponseDefinition};
pub use materializer::{encoded_body, materialize, Reply, ReplyBody, NOT_FOUND_BODY};
