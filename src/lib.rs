//! LiveryFE: masked HSV grading of aircraft textures, outlined tail-number
//! overlays with mirrored child layers, and whole-livery export.
//!
//! The `ops` modules hold the pure image operations; `viewport` and
//! `preview` hold the editor state math and the debounced recompute worker;
//! `io`, `project` and `cli` wire them to files on disk.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod cli;
pub mod io;
pub mod ops;
pub mod preview;
pub mod project;
pub mod viewport;
