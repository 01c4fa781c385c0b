//! autosprite - build-time CSS sprite pipeline
//!
//! This library provides functionality to:
//! - Scan stylesheets for background images flagged for sprite consolidation
//! - Pack the referenced images into per-target sprite sheets
//! - Rewrite the stylesheet declarations to point at the packed sheets
//! - Resolve legacy PNG fixup markers against the rewritten selectors

pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fileset;
pub mod fixup;
pub mod group;
pub mod pack;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod rewrite;
pub mod stylesheet;
