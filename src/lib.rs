//! Detect hardcoded UI text in JS/TS sources and migrate it to label
//! references backed by a label store.
//!
//! The pipeline per file is: [`source`] read, [`detect`] (line and AST
//! strategies, filtered by [`ignore`]), [`identity`] synthesis, [`store`]
//! write, [`rewrite`] and finally [`report`]. [`migrate`] drives it over a
//! directory tree.

pub mod commands;
pub mod config;
pub mod detect;
pub mod error;
pub mod fs;
pub mod identity;
pub mod ignore;
pub mod logging;
pub mod migrate;
pub mod report;
pub mod rewrite;
pub mod source;
pub mod store;

pub use config::Config;
pub use detect::{detect_source, Classification, Occurrence, TextSite};
pub use error::{MigrateError, StoreError};
pub use identity::LabelIdentity;
pub use migrate::{MigrationResult, Migrator};
pub use store::{LabelRecord, LabelStore};
