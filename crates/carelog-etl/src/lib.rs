//! Carelog ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads a home-care EMR export (caregiver profiles and care-visit logs)
//! into Postgres staging tables, then rebuilds a normalized model with
//! lookup dimensions from them.
//!
//! # Stages
//!
//! - [`reader`]: streaming, header-keyed CSV records
//! - [`coerce`]: raw text to nullable booleans, integers and strings
//! - [`staging`]: one transactional upsert pass per extract
//! - [`normalize`]: dimension resolution and fact table rebuild
//!
//! # Example
//!
//! ```no_run
//! use carelog_etl::{config::{EtlConfig, SourcePaths}, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EtlConfig::load()?;
//!     let pool = config.database.connect().await?;
//!
//!     let report = Pipeline::new(pool.clone()).run(&SourcePaths::default()).await;
//!     pool.close().await;
//!
//!     println!("{:?}", report?.normalize.counts);
//!     Ok(())
//! }
//! ```

pub mod coerce;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod staging;

pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, PipelineReport, StageReport};
