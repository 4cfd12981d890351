//! Root crate: CLI entrypoint and the Brain HTTP surface (spec.md §6),
//! grounded on the teacher's `src/cli` and `src/server/router.rs`.

pub mod cli;
pub mod config;
pub mod server;
