//! promgate-extract — turns JSON API responses into metric values.
//!
//! # Architecture
//!
//! ```text
//! MetricSource (one per configured metric)
//!   ├── Scalar → ScalarQuery::extract() → one value
//!   └── Vector → VectorQuery::extract() → Vec<MetricVal>
//!         ├── collection path → JSON array
//!         └── per item: value path + label paths (declared order)
//!
//! JsonPath
//!   ├── from_slashed("a/b/c") → "$.a.b.c"
//!   └── resolve() → Resolved {Number, String, Sequence, Mapping, Other}
//! ```
//!
//! Extraction is all-or-nothing: one malformed item fails the whole
//! metric.

pub mod error;
pub mod path;
pub mod scalar;
pub mod source;
pub mod vector;

pub use error::{ExtractError, ExtractResult};
pub use path::{lookup, resolve, translate, JsonPath, Resolved};
pub use scalar::ScalarQuery;
pub use source::MetricSource;
pub use vector::{extract, LabelQuery, MetricVal, VectorQuery};
