#![forbid(unsafe_code)]

//! Core domain model and business logic for Rulebook.
//!
//! This crate provides:
//! - Domain types (progression rules, block types, field values)
//! - The variant catalog mapping block forms to rule rows
//! - Folding, change tracking and diffing of program weeks
//! - Persistence (file-backed rule store, CSV export)
//! - Workout templates and the week engine

pub mod types;
pub mod error;
pub mod form;
pub mod catalog;
pub mod folder;
pub mod tracker;
pub mod diff;
pub mod exercises;
pub mod templates;
pub mod store;
pub mod engine;
pub mod export;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use form::FormValue;
pub use catalog::{validate_catalog, variant, VariantSpec};
pub use folder::{fold_blocks, BlockFormState};
pub use diff::{build_save_plan, RowOperation};
pub use exercises::{ExerciseCatalog, ExerciseLookup};
pub use templates::{expand_template, TemplateLibrary};
pub use store::{FileRuleStore, RuleStore};
pub use engine::{fetch_week, LoadedWeek, SaveReport, WeekSession};
pub use export::{export_rules_csv, write_rules_csv};
pub use config::Config;
