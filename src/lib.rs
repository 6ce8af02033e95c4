//! # rb-bench-analysis: Benchmark Result Aggregation
//!
//! Turns the per-peer JSON artifacts of a reliable-broadcast benchmark farm
//! into grouped, unit-normalized statistics and baseline-relative overheads.
//!
//! ## Pipeline
//!
//! ```text
//! experiment dir ──► discovery ──► artifact loader ──┬─► summary records
//!   (round-50_echo-20/exp_sub_*.json)                └─► pairwise links
//!                                                          │
//!        normalizer ◄──────────────────────────────────────┘
//!            │
//!            ▼
//!   missing-data policy ──► aggregator ──► overhead vs baseline
//!                                 │                 │
//!                                 └──► Arrow / Parquet tables
//! ```
//!
//! ## Design Principles
//!
//! - Parameters are decoded by tag (`round-<int>`, `echo-<int>`), never by
//!   position in the directory name
//! - Every value carries its unit; normalization happens exactly once
//! - Undefined is undefined: an empty result vector is never a zero
//! - Stages return new record sets; output order is a total key order
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rb_bench_analysis::config::AnalysisConfig;
//! use rb_bench_analysis::pipeline::{Analysis, ExperimentSource, LinkGrouping};
//!
//! let analysis = Analysis::new(AnalysisConfig::default().with_max_payload_size(Some(8192)))?;
//! let report = analysis.links(
//!     &[ExperimentSource::decode("results/2022-05-11_round-50_echo-20")],
//!     LinkGrouping::Locality,
//! )?;
//! for group in &report.groups {
//!     println!("{}: {} links", group.key(), group.record_count());
//! }
//! # Ok::<(), rb_bench_analysis::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod artifact;
pub mod batch;
pub mod config;
pub mod config_key;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod links;
pub mod missing;
pub mod overhead;
pub mod pipeline;
pub mod record;
pub mod table;
pub mod units;

pub use error::{Error, Result};
