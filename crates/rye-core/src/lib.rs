//! Rye core library: the resolution and execution core of an agent-tool
//! orchestration system.
//!
//! Items (directives, tools, knowledge entries) live on disk in three spaces
//! with fixed precedence `project > user > system`.  This crate provides the
//! boolean query engine used by search, integrity hashing with a fingerprint
//! cache, environment and interpreter resolution, shell-safe config
//! templating, executor chain validation, and the primitive executor that
//! ties them together.  With the `python` feature it also builds as the
//! `_rye_core` extension module.

pub mod cache;
pub mod chain;
pub mod config;
pub mod env;
pub mod errors;
pub mod extract;
pub mod integrity;
pub mod models;
pub mod query;
pub mod version;

#[cfg(feature = "python")]
mod python;
