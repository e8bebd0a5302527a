//! Client-side protocol core for an IMAP-style groupware wire protocol.
//!
//! This crate implements the command/response layer a groupware client sits
//! on: building wire-format commands, tagging them for reply correlation,
//! parsing tagged/untagged server responses, negotiating capabilities, and
//! running the batched collection-fetch pipeline that de-overlaps recursive
//! multi-root fetches. The transport is a pluggable collaborator (anything
//! implementing [`Connection`]); the crate never spawns threads and never
//! blocks inside a job.
//!
//! # Usage
//!
//! ```no_run
//! use groupwire::{FetchDepth, FetchJob, TagGenerator, TcpConnection};
//! use std::time::Instant;
//!
//! fn main() -> groupwire::Result<()> {
//!     let mut conn = TcpConnection::connect(("groupware.example.com", 4143))?;
//!     let mut tags = TagGenerator::new();
//!
//!     let mut job = FetchJob::new(vec![1], FetchDepth::Recursive)
//!         .on_batch(|batch| println!("got {} records", batch.len()));
//!     job.start(&mut conn, &mut tags)?;
//!
//!     while !job.is_complete() {
//!         let mut line = String::new();
//!         conn.read_line(&mut line)?;
//!         job.process_line(&mut conn, &mut tags, &line, Instant::now())?;
//!     }
//!     Ok(())
//! }
//! ```

mod parse;
mod types;
mod utils;

pub mod command;
pub mod conn;
pub mod error;
pub mod headers;
pub mod job;

pub use crate::command::{Command, ResultCode};
pub use crate::conn::{Connection, TcpConnection};
pub use crate::error::{Error, Result};
pub use crate::headers::MessageHeaders;
pub use crate::job::{FailurePolicy, FetchJob, SubmitJob, TagGenerator, BATCH_WINDOW};
pub use crate::types::*;

#[cfg(test)]
mod mock_conn;
