//! # puzzle-tracker
//!
//! Turns puzzle datasets (JSON arrays of `{"title", "url"}` objects, one file
//! per difficulty tier) into a single XLSX progress tracker.
//!
//! Every tier becomes a worksheet with a frozen header row, fixed column
//! widths, case-sensitive status highlighting, a Status dropdown, and a
//! summary block of live count and percentage formulas.
//!
//! ## Example
//!
//! ```no_run
//! use puzzle_tracker::{completion_message, TrackerBuilder, TrackerConfig};
//!
//! let builder = TrackerBuilder::new(TrackerConfig::default())?;
//! let output = builder.run()?;
//! println!("{}", completion_message(&output));
//! # Ok::<(), puzzle_tracker::TrackerError>(())
//! ```

pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod output;
pub mod summary;

pub use builder::{completion_message, run, TrackerBuilder, HEADERS, STATUS_COL};
pub use config::{StatusConfig, TierConfig, TrackerConfig, DEFAULT_OUTPUT};
pub use dataset::{PuzzleRecord, TrackerRow};
pub use error::{Result, TrackerError};
