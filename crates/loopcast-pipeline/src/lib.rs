//! Duration-matched audio/video loop assembly.
//!
//! This crate provides:
//! - Track selection with exclusion and seedable shuffling
//! - Loudness normalization and crossfade chaining of the audio pool
//! - A ping-pong video cycle and duration-matched looping of both streams
//! - The [`Assembler`] that runs both paths concurrently and publishes the mux
//! - `list`/`check` inventory helpers

pub mod assembler;
pub mod config;
pub mod crossfade;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod looper;
pub mod manifest;
pub mod metrics;
pub mod muxer;
pub mod normalizer;
pub mod selector;
pub mod stage;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::Assembler;
pub use config::AssemblyConfig;
pub use error::{AssemblyError, PipelineResult, Stage};
pub use inventory::{check_assets, list_inventory, AssetPlan, Inventory};
pub use logging::RunLogger;
