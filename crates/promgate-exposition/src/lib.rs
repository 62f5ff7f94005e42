//! promgate-exposition — the Prometheus text exposition format.
//!
//! Parses exposition streams into metric families, merges families from
//! several streams by name, adds identity labels, and renders the result
//! back to text for scraping by a Prometheus server or compatible agent.
//!
//! # Architecture
//!
//! ```text
//! bytes ──parse()──▶ MetricFamilies (name → MetricFamily)
//!                        │
//!   merge_all(streams) ──┤ record() per stream, local first
//!                        │   same name → series appended
//!                        ▼
//!                    encode() ──▶ bytes
//!
//! apply_default_labels(stream, [(job, ..), (instance, ..)])
//!   └── series missing any required label get all of them
//! fill_missing_labels(stream, [(job, ..), (instance, ..)])
//!   └── series get only the labels they lack
//! ```
//!
//! Decoding goes through `openmetrics_parser`; see [`parser`].

pub mod encoder;
pub mod error;
pub mod family;
pub mod labels;
pub mod merge;
pub mod parser;

pub use encoder::{encode, encode_family};
pub use error::{ExpositionError, ExpositionResult};
pub use family::{
    Bucket, Histogram, LabelPair, Metric, MetricFamilies, MetricFamily, MetricType, MetricValue,
    Quantile, Summary,
};
pub use labels::{apply_default_labels, fill_missing_labels, find_families_without_labels};
pub use merge::{merge_all, record};
pub use parser::parse;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
