//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`resolve`] - Resolve a view state to a tile and URL
//! - [`fetch`] - Fetch a single overlay into the cache
//! - [`play`] - Run an animation loop and print its steps
//! - [`kml`] - Export an overlay group as KML
//! - [`purge`] - Remove cached overlay files
//! - [`config`] - Configuration management (init, show, path)

pub mod common;
pub mod config;
pub mod fetch;
pub mod kml;
pub mod play;
pub mod purge;
pub mod resolve;
