//! Identity labels for series that lack them.

use tracing::debug;

use crate::encoder::encode;
use crate::error::ExpositionResult;
use crate::family::{LabelPair, MetricFamilies};
use crate::parser::parse;

/// Names of families with at least one series missing any of `required`.
pub fn find_families_without_labels(families: &MetricFamilies, required: &[&str]) -> Vec<String> {
    families
        .values()
        .filter(|family| family.metrics.iter().any(|m| !m.has_all_labels(required)))
        .map(|family| family.name.clone())
        .collect()
}

/// Give every series the `(name, value)` pairs in `defaults`.
///
/// A series is rewritten only when it lacks at least one of the names,
/// and then every pair is appended, even a name the series already has.
/// Callers must not pass labels the stream may carry with another value:
/// the duplicate reaches the output and the stream no longer parses.
/// [`fill_missing_labels`] is the variant for streams from elsewhere.
///
/// Input with nothing to rewrite is returned byte for byte.
pub fn apply_default_labels(stream: &[u8], defaults: &[(&str, &str)]) -> ExpositionResult<Vec<u8>> {
    relabel(stream, defaults, Fill::All)
}

/// Give every series the pairs in `defaults` whose names it lacks. Labels
/// a series already carries keep their value.
///
/// Input with nothing to rewrite is returned byte for byte.
pub fn fill_missing_labels(stream: &[u8], defaults: &[(&str, &str)]) -> ExpositionResult<Vec<u8>> {
    relabel(stream, defaults, Fill::Missing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    All,
    Missing,
}

fn relabel(stream: &[u8], defaults: &[(&str, &str)], fill: Fill) -> ExpositionResult<Vec<u8>> {
    let mut families = parse(stream)?;
    let required: Vec<&str> = defaults.iter().map(|(name, _)| *name).collect();

    let missing = find_families_without_labels(&families, &required);
    if missing.is_empty() {
        return Ok(stream.to_vec());
    }

    let mut rewritten = 0usize;
    for name in &missing {
        let Some(family) = families.get_mut(name) else {
            continue;
        };
        for metric in &mut family.metrics {
            if metric.has_all_labels(&required) {
                continue;
            }
            let added: Vec<LabelPair> = defaults
                .iter()
                .filter(|(label, _)| fill == Fill::All || !metric.has_label(label))
                .map(|(label, value)| LabelPair::new(*label, *value))
                .collect();
            metric.labels.extend(added);
            rewritten += 1;
        }
    }

    debug!(
        families = missing.len(),
        series = rewritten,
        ?fill,
        "default labels applied"
    );
    encode(&families)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpositionError;
    use crate::family::MetricValue;

    const DEFAULTS: &[(&str, &str)] = &[("job", "promgate"), ("instance", "10.0.0.1:8080")];

    #[test]
    fn unlabeled_series_get_identity() {
        let stream = b"# TYPE process_open_fds gauge\nprocess_open_fds 12\n";
        let out = apply_default_labels(stream, DEFAULTS).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "# TYPE process_open_fds gauge\n\
             process_open_fds{job=\"promgate\",instance=\"10.0.0.1:8080\"} 12\n"
        );
    }

    #[test]
    fn labeled_series_are_untouched() {
        let stream = "up{job=\"other\",instance=\"h:1\"} 1\n\
                      requests{code=\"200\"} 5\n";
        let families = parse(&apply_default_labels(stream.as_bytes(), DEFAULTS).unwrap()).unwrap();

        let up = &families["up"].metrics[0];
        assert_eq!(up.label("job"), Some("other"));
        assert_eq!(up.labels.len(), 2);

        let requests = &families["requests"].metrics[0];
        assert_eq!(requests.label("code"), Some("200"));
        assert_eq!(requests.label("job"), Some("promgate"));
        assert_eq!(requests.label("instance"), Some("10.0.0.1:8080"));
    }

    #[test]
    fn already_labeled_input_is_byte_identical() {
        let stream = b"# HELP up Whether up.\n# TYPE up gauge\n\
                       up{instance=\"b\",job=\"a\"} 1\n\n# trailing comment\n";
        let once = apply_default_labels(stream, DEFAULTS).unwrap();
        let twice = apply_default_labels(&once, DEFAULTS).unwrap();
        assert_eq!(once, stream.to_vec());
        assert_eq!(once, twice);
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let stream = b"a 1\nb{x=\"y\"} 2\n";
        let once = apply_default_labels(stream, DEFAULTS).unwrap();
        let twice = apply_default_labels(&once, DEFAULTS).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn histogram_series_are_labeled() {
        let stream = "# TYPE lat histogram\n\
                      lat_bucket{le=\"1\"} 1\n\
                      lat_bucket{le=\"+Inf\"} 2\n\
                      lat_sum 0.5\n\
                      lat_count 2\n";
        let out = apply_default_labels(stream.as_bytes(), DEFAULTS).unwrap();
        let families = parse(&out).unwrap();

        let metric = &families["lat"].metrics[0];
        assert_eq!(metric.label("job"), Some("promgate"));
        let MetricValue::Histogram(h) = &metric.value else {
            panic!("expected histogram");
        };
        assert_eq!(h.buckets.len(), 2);
        assert_eq!(h.count, Some(2.0));
    }

    #[test]
    fn partially_labeled_series_get_duplicate_label() {
        // Only `instance` is missing, yet both labels are appended, so the
        // series ends up with two `job` labels and the output no longer
        // parses.
        let stream = b"up{job=\"other\"} 1\n";
        let out = apply_default_labels(stream, DEFAULTS).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(
            text,
            "# TYPE up untyped\n\
             up{job=\"other\",job=\"promgate\",instance=\"10.0.0.1:8080\"} 1\n"
        );
        assert!(matches!(parse(&out), Err(ExpositionError::Decode { .. })));
    }

    #[test]
    fn fill_keeps_labels_the_series_already_has() {
        let stream = b"up{job=\"custom\"} 1\nload 0.5\n";
        let out = fill_missing_labels(stream, DEFAULTS).unwrap();
        let families = parse(&out).unwrap();

        let up = &families["up"].metrics[0];
        assert_eq!(up.labels.len(), 2);
        assert_eq!(up.label("job"), Some("custom"));
        assert_eq!(up.label("instance"), Some("10.0.0.1:8080"));

        let load = &families["load"].metrics[0];
        assert_eq!(load.label("job"), Some("promgate"));
        assert_eq!(load.label("instance"), Some("10.0.0.1:8080"));
    }

    #[test]
    fn fill_leaves_complete_input_alone() {
        let stream = b"up{job=\"a\",instance=\"b\"} 1\n";
        assert_eq!(fill_missing_labels(stream, DEFAULTS).unwrap(), stream.to_vec());
    }

    #[test]
    fn finds_families_missing_labels() {
        let families = parse(
            b"full{job=\"a\",instance=\"b\"} 1\n\
              half{job=\"a\"} 1\n\
              mixed{job=\"a\",instance=\"b\"} 1\n\
              mixed 2\n",
        )
        .unwrap();
        let missing = find_families_without_labels(&families, &["job", "instance"]);
        assert_eq!(missing, vec!["half".to_string(), "mixed".to_string()]);
        assert!(find_families_without_labels(&families, &[]).is_empty());
    }

    #[test]
    fn malformed_stream_is_an_error() {
        let err = apply_default_labels(b"bad{ 1\n", DEFAULTS).unwrap_err();
        assert!(matches!(err, ExpositionError::Decode { .. }));
    }
}
