//! Configuration Module
//!
//! - [`settings`]: Engine settings, reference assets and per-stage tool options
//! - [`sample_sheet`]: The tab-delimited sample sheet

pub mod sample_sheet;
pub mod settings;

pub use sample_sheet::{Layout, SampleRow, SampleSheet, Strandness};
pub use settings::{Assets, Settings, DEFAULT_SETTINGS, SETTINGS_ENV};
