//! Shared data model for the LineSim assembly-line simulator.
//!
//! This crate holds everything the kernel and the CLI exchange: the run
//! configuration, the process graph, timeline events, the result record,
//! the virtual-minute calendar grid, and the CSV surface for process
//! input and event export.

pub mod config;
pub mod csvio;
pub mod error;
pub mod event;
pub mod process;
pub mod result;
pub mod timegrid;
