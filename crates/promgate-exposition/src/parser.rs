//! Text exposition parser.
//!
//! Decoding is done by `openmetrics_parser`. Its Prometheus grammar is
//! stricter than what exporters and concatenated streams look like in
//! practice, so a line pass cuts the input into blocks the grammar takes
//! in one piece:
//!
//! - a repeated `# TYPE` or `# HELP` line starts a new block, as does a
//!   family reappearing after another one, a repeated series, or a change
//!   of label names within a family. Concatenated streams therefore parse
//!   and keep their series apart.
//! - a repeated `# TYPE` that disagrees with the first one is rejected.
//! - `untyped` families and counters without the `_total` suffix are
//!   declared as gauges to the grammar and get their type back afterwards.
//!
//! Blocks are decoded in order and their families folded into one
//! [`MetricFamilies`] map.

use std::collections::btree_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use openmetrics_parser::prometheus::parse_prometheus;
use openmetrics_parser::{
    LabelSet, ParseError, PrometheusMetricFamily, PrometheusType, PrometheusValue,
};
use tracing::debug;

use crate::error::{ExpositionError, ExpositionResult};
use crate::family::{
    Bucket, Histogram, LabelPair, Metric, MetricFamilies, MetricFamily, MetricType, MetricValue,
    Quantile, Summary,
};

/// Parse a complete exposition stream.
///
/// Families that end up without samples (only `HELP`/`TYPE` lines) are
/// dropped.
pub fn parse(stream: &[u8]) -> ExpositionResult<MetricFamilies> {
    let text = std::str::from_utf8(stream).map_err(|e| ExpositionError::Decode {
        line: stream[..e.valid_up_to()]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1,
        reason: "invalid UTF-8".to_string(),
    })?;

    let mut splitter = Splitter::default();
    for (idx, line) in text.lines().enumerate() {
        splitter
            .line(line, idx + 1)
            .map_err(|reason| ExpositionError::Decode {
                line: idx + 1,
                reason,
            })?;
    }
    let (blocks, declared) = splitter.finish();
    if blocks.len() > 1 {
        debug!(blocks = blocks.len(), "exposition split into blocks");
    }

    let mut families = MetricFamilies::new();
    for block in &blocks {
        let exposition = parse_prometheus(&block.text).map_err(|e| block.decode_error(&e))?;
        for family in exposition.families.into_values() {
            let family = convert_family(family, &declared).map_err(|e| block.decode_error(&e))?;
            fold(&mut families, family);
        }
    }
    families.retain(|_, family| !family.metrics.is_empty());
    Ok(families)
}

// ── Block splitting ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Descriptor {
    Help,
    Type,
}

/// What a block has seen of one family.
#[derive(Default)]
struct FamilyRun {
    help: bool,
    typed: bool,
    series: HashSet<String>,
    /// Sorted label names, without `le`/`quantile`.
    label_names: Option<Vec<String>>,
}

/// Part of the input the grammar can decode on its own.
#[derive(Default)]
struct Block {
    text: String,
    /// Input line number of every line in `text`.
    lines: Vec<usize>,
    families: HashMap<String, FamilyRun>,
    current: Option<String>,
}

impl Block {
    fn push(&mut self, line: &str, line_no: usize) {
        self.text.push_str(line);
        self.text.push('\n');
        self.lines.push(line_no);
    }

    /// Make `family` the current family. A blank line ends the previous
    /// one, otherwise the grammar reads adjacent samples as one family.
    fn open(&mut self, family: &str, line_no: usize) -> &mut FamilyRun {
        if self.current.as_deref() != Some(family) {
            if self.current.is_some() {
                self.push("", line_no);
            }
            self.current = Some(family.to_string());
        }
        self.families.entry(family.to_string()).or_default()
    }

    fn is_current(&self, family: &str) -> bool {
        self.current.as_deref() == Some(family)
    }

    fn decode_error(&self, err: &ParseError) -> ExpositionError {
        let message = err.to_string();
        let line = reported_line(&message)
            .and_then(|line| self.lines.get(line.checked_sub(1)?))
            .or(self.lines.first())
            .copied()
            .unwrap_or(1);
        ExpositionError::Decode {
            line,
            reason: short_reason(&message),
        }
    }
}

#[derive(Default)]
struct Splitter {
    /// Every `# TYPE` seen so far, by family name.
    declared: HashMap<String, MetricType>,
    /// Families that already have samples somewhere in the stream.
    sampled: HashSet<String>,
    blocks: Vec<Block>,
    block: Block,
}

impl Splitter {
    fn line(&mut self, line: &str, line_no: usize) -> Result<(), String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match line.strip_prefix('#') {
            Some(comment) => self.comment(comment, line_no),
            None => {
                self.sample(line, line_no);
                Ok(())
            }
        }
    }

    fn finish(mut self) -> (Vec<Block>, HashMap<String, MetricType>) {
        self.next_block();
        (self.blocks, self.declared)
    }

    fn next_block(&mut self) {
        let block = std::mem::take(&mut self.block);
        if !block.lines.is_empty() {
            self.blocks.push(block);
        }
    }

    fn comment(&mut self, comment: &str, line_no: usize) -> Result<(), String> {
        let (keyword, rest) = split_token(comment.trim_start());
        let (name, rest) = split_token(rest.trim_start());
        match keyword {
            "HELP" => {
                if name.is_empty() {
                    return Err("HELP line without metric name".to_string());
                }
                let help = rest.strip_prefix([' ', '\t']).unwrap_or(rest);
                self.descriptor(name, Descriptor::Help, line_no);
                self.block
                    .push(&format!("# HELP {name} {}", quote_help(help)), line_no);
                Ok(())
            }
            "TYPE" => {
                if name.is_empty() {
                    return Err("TYPE line without metric name".to_string());
                }
                let keyword = rest.trim();
                let ty = MetricType::parse(keyword)
                    .ok_or_else(|| format!("unknown metric type {keyword:?} for {name}"))?;
                match self.declared.get(name) {
                    Some(&existing) if existing != ty => {
                        return Err(format!(
                            "conflicting TYPE line for metric name {name}: {existing} then {ty}"
                        ));
                    }
                    None if self.sampled.contains(name) => {
                        return Err(format!("TYPE reported after samples for metric name {name}"));
                    }
                    _ => {}
                }
                self.declared.insert(name.to_string(), ty);
                self.descriptor(name, Descriptor::Type, line_no);
                self.block.push(&type_line(name, ty), line_no);
                Ok(())
            }
            // Plain comment.
            _ => Ok(()),
        }
    }

    /// Open `name` for a `# HELP`/`# TYPE` line, in a fresh block when
    /// this one cannot take it.
    fn descriptor(&mut self, name: &str, kind: Descriptor, line_no: usize) {
        let fits = match self.block.families.get(name) {
            None => true,
            Some(run) => {
                let repeated = match kind {
                    Descriptor::Help => run.help,
                    Descriptor::Type => run.typed,
                };
                self.block.is_current(name) && run.series.is_empty() && !repeated
            }
        };
        if !fits {
            self.next_block();
        }
        let run = self.block.open(name, line_no);
        match kind {
            Descriptor::Help => run.help = true,
            Descriptor::Type => run.typed = true,
        }
    }

    fn sample(&mut self, line: &str, line_no: usize) {
        let (key, names) = scan_series(line);
        let name = &key[..key.find('{').unwrap_or(key.len())];
        let family = self.family_of(name);
        let ty = self.declared.get(&family).copied();
        let label_names = grouping_labels(names, ty);

        let fits = match self.block.families.get(&family) {
            None => true,
            Some(run) => {
                self.block.is_current(&family)
                    && !run.series.contains(key)
                    && run
                        .label_names
                        .as_ref()
                        .is_none_or(|known| *known == label_names)
            }
        };
        if !fits {
            self.next_block();
        }

        let run = self.block.open(&family, line_no);
        // A family continued in a new block needs its type again.
        let redeclare = match ty {
            Some(ty) if !run.typed => {
                run.typed = true;
                Some(ty)
            }
            _ => None,
        };
        run.series.insert(key.to_string());
        run.label_names = Some(label_names);

        if let Some(ty) = redeclare {
            self.block.push(&type_line(&family, ty), line_no);
        }
        self.block.push(line, line_no);
        self.sampled.insert(family);
    }

    /// Family a sample name belongs to, resolving histogram and summary
    /// suffixes against declared types.
    fn family_of(&self, name: &str) -> String {
        for suffix in ["_bucket", "_sum", "_count"] {
            let Some(base) = name.strip_suffix(suffix) else {
                continue;
            };
            match (self.declared.get(base), suffix) {
                (Some(MetricType::Histogram), _)
                | (Some(MetricType::Summary), "_sum" | "_count") => return base.to_string(),
                _ => {}
            }
        }
        name.to_string()
    }
}

/// `# TYPE` line in the dialect the grammar accepts.
fn type_line(name: &str, ty: MetricType) -> String {
    let keyword = match ty {
        MetricType::Untyped => "gauge",
        MetricType::Counter if !name.ends_with("_total") => "gauge",
        ty => ty.as_str(),
    };
    format!("# TYPE {name} {keyword}")
}

/// Split a sample line into its series key (`name{labels}`) and the label
/// names inside the braces. Values are not decoded.
fn scan_series(line: &str) -> (&str, Vec<&str>) {
    let Some(end) = line.find(|c: char| c == '{' || c.is_whitespace()) else {
        return (line, Vec::new());
    };
    if !line[end..].starts_with('{') {
        return (&line[..end], Vec::new());
    }

    let body = end + 1;
    let mut names = Vec::new();
    let mut start = body;
    let mut quoted = false;
    let mut escaped = false;
    for (offset, c) in line[body..].char_indices() {
        let idx = body + offset;
        if quoted {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => quoted = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            '=' => names.push(line[start..idx].trim()),
            ',' => start = idx + 1,
            '}' => return (&line[..=idx], names),
            _ => {}
        }
    }
    (line, names)
}

/// Label names that identify a series within its family, in line order.
///
/// Order matters: the grammar stores values positionally against the
/// first series' names.
fn grouping_labels(names: Vec<&str>, ty: Option<MetricType>) -> Vec<String> {
    let bound = match ty {
        Some(MetricType::Histogram) => Some("le"),
        Some(MetricType::Summary) => Some("quantile"),
        _ => None,
    };
    names
        .into_iter()
        .filter(|name| Some(*name) != bound)
        .map(str::to_string)
        .collect()
}

/// Split at the first whitespace: `(token, remainder)`.
fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

/// Escape bare double quotes in HELP text; the grammar only takes them
/// escaped.
fn quote_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    let mut chars = help.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// Line number from a pest error location (` --> 3:8`).
fn reported_line(message: &str) -> Option<usize> {
    let (_, location) = message.split_once("--> ")?;
    location.split(':').next()?.trim().parse().ok()
}

/// The `= expected ...` tail of a pest error, or the whole message.
fn short_reason(message: &str) -> String {
    match message.rsplit_once("= ") {
        Some((_, tail)) if message.contains("-->") => tail.trim().to_string(),
        _ => message.trim().to_string(),
    }
}

// ── Mapping ──────────────────────────────────────────────────────

fn convert_family(
    family: PrometheusMetricFamily,
    declared: &HashMap<String, MetricType>,
) -> Result<MetricFamily, ParseError> {
    let metric_type = declared
        .get(&family.family_name)
        .copied()
        .unwrap_or(match family.family_type {
            PrometheusType::Counter => MetricType::Counter,
            PrometheusType::Gauge => MetricType::Gauge,
            PrometheusType::Histogram => MetricType::Histogram,
            PrometheusType::Summary => MetricType::Summary,
            PrometheusType::Unknown => MetricType::Untyped,
        });

    let mut out = MetricFamily::new(family.family_name.clone(), metric_type);
    if !family.help.is_empty() {
        out.help = Some(unescape(&family.help));
    }

    let names = Arc::new(family.get_label_names().to_vec());
    for sample in family.iter_samples() {
        let labels = LabelSet::new(Arc::clone(&names), sample)?
            .iter()
            .map(|(name, value)| LabelPair::new(name.as_str(), unescape(value)))
            .collect();
        out.metrics.push(Metric {
            labels,
            value: convert_value(&sample.value),
            timestamp_ms: sample.timestamp.map(|ts| ts as i64),
        });
    }
    Ok(out)
}

fn convert_value(value: &PrometheusValue) -> MetricValue {
    match value {
        PrometheusValue::Unknown(n) | PrometheusValue::Gauge(n) => MetricValue::Simple(n.as_f64()),
        PrometheusValue::Counter(counter) => MetricValue::Simple(counter.value.as_f64()),
        PrometheusValue::Histogram(h) => MetricValue::Histogram(Histogram {
            buckets: h
                .buckets
                .iter()
                .map(|b| Bucket {
                    upper_bound: b.upper_bound,
                    cumulative_count: b.count.as_f64(),
                })
                .collect(),
            sum: h.sum.map(|sum| sum.as_f64()),
            count: h.count.map(|count| count as f64),
        }),
        PrometheusValue::Summary(s) => MetricValue::Summary(Summary {
            quantiles: s
                .quantiles
                .iter()
                .map(|q| Quantile {
                    quantile: q.quantile,
                    value: q.value.as_f64(),
                })
                .collect(),
            sum: s.sum.map(|sum| sum.as_f64()),
            count: s.count.map(|count| count as f64),
        }),
    }
}

/// Fold a block's family into the result; later blocks append.
fn fold(families: &mut MetricFamilies, family: MetricFamily) {
    match families.entry(family.name.clone()) {
        Entry::Occupied(mut entry) => {
            let existing = entry.get_mut();
            if existing.help.is_none() {
                existing.help = family.help;
            }
            existing.metrics.extend(family.metrics);
        }
        Entry::Vacant(entry) => {
            entry.insert(family);
        }
    }
}

/// Undo `\\`, `\n` and `\"` escapes in label values and HELP text.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
