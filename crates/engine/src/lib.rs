//! Conversion engine for saved pages.
//!
//! This crate provides the renderers that turn cached section responses into
//! single documents, and the migration pipeline that drives them over the
//! saved reading lists.

pub mod migrate;
pub mod render;

pub use migrate::{
    CompletionGate, ConversionOrchestrator, ConversionReport, GateVerdict, MigrationBatch, MigrationOutcome,
    MigrationPlanner, MigrationTask, Migrator, TaskStatus,
};
pub use render::{RenderError, RenderJob, Renderer, SectionsRenderer};

#[cfg(feature = "headless")]
pub use render::HeadlessRenderer;
