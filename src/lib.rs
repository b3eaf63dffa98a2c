//! # scholardock
//!
//! Google Scholar literature harvester with a browser fallback for robot checks.
//!
//! ## Modules
//!
//! - [`harvest`] - Scoped session and pagination loop
//! - [`fetcher`] - Persistent HTTP session
//! - [`block`] - Robot-check detection
//! - [`browser`] - Chromium fallback with human-assist wait
//! - [`parser`] - Entry container lookup
//! - [`extract`] - Field heuristics for one entry
//! - [`record`] - Query and article types
//! - [`control`] - Observable state and cancellation
//! - [`config`] - Session configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholardock::{HarvestConfig, HarvestSession, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = SearchQuery::new("machine learning", 30, Some(2020), None)?;
//!     let records = HarvestSession::run(HarvestConfig::default(), &query).await?;
//!     println!("Found {} results", records.len());
//!     Ok(())
//! }
//! ```

pub mod block;
pub mod browser;
pub mod config;
pub mod control;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod harvest;
pub mod parser;
pub mod record;

pub use config::HarvestConfig;
pub use control::{HarvestControl, HarvestState};
pub use error::{HarvestError, Result};
pub use harvest::HarvestSession;
pub use record::{ArticleRecord, SearchQuery};
