//! Merging exposition streams by family name.

use std::collections::btree_map::Entry;

use tracing::{debug, error, warn};

use crate::encoder::encode;
use crate::error::ExpositionResult;
use crate::family::MetricFamilies;
use crate::parser::parse;

/// Parse `stream` and fold its families into `families`.
///
/// A family already present keeps its help and type and gets the new
/// series appended after its own. Nothing is recorded if the stream does
/// not parse.
pub fn record(families: &mut MetricFamilies, stream: &[u8]) -> ExpositionResult<()> {
    let parsed = parse(stream).inspect_err(|e| {
        error!(error = %e, "reading text format failed");
    })?;

    for (name, family) in parsed {
        match families.entry(name) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if existing.metric_type != family.metric_type {
                    warn!(
                        family = %existing.name,
                        kept = %existing.metric_type,
                        dropped = %family.metric_type,
                        "merging families with different types"
                    );
                }
                existing.metrics.extend(family.metrics);
            }
            Entry::Vacant(entry) => {
                entry.insert(family);
            }
        }
    }
    Ok(())
}

/// Merge several streams into one exposition.
///
/// Streams are recorded in order, so for a shared family the series of
/// earlier streams come first. Identical series are not deduplicated.
/// Any stream that fails to parse fails the whole merge.
pub fn merge_all(streams: &[&[u8]]) -> ExpositionResult<Vec<u8>> {
    let mut families = MetricFamilies::new();
    for (idx, stream) in streams.iter().enumerate() {
        record(&mut families, stream).inspect_err(|e| {
            error!(stream = idx, error = %e, "cannot record metrics stream");
        })?;
    }

    let merged = encode(&families)?;
    debug!(
        streams = streams.len(),
        families = families.len(),
        bytes = merged.len(),
        "metrics merged"
    );
    Ok(merged)
}
