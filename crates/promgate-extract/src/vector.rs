//! Labeled value vectors extracted from a JSON collection.

use serde_json::Value;
use tracing::trace;

use crate::error::{ExtractError, ExtractResult};
use crate::path::{resolve, JsonPath, Resolved};

/// One extracted observation: a value and its label values, in the
/// order the labels were declared.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricVal {
    pub val: f64,
    pub labels: Vec<String>,
}

/// A named label and the query locating its value inside an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelQuery {
    pub name: String,
    pub path: JsonPath,
}

impl LabelQuery {
    pub fn new(name: &str, query: &str) -> ExtractResult<Self> {
        Ok(Self {
            name: name.to_string(),
            path: JsonPath::from_slashed(query)?,
        })
    }
}

/// A compiled vector extraction: collection, per-item value and labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorQuery {
    collection: JsonPath,
    value: JsonPath,
    labels: Vec<LabelQuery>,
}

impl VectorQuery {
    pub fn new(collection: &str, value: &str, labels: Vec<LabelQuery>) -> ExtractResult<Self> {
        Ok(Self {
            collection: JsonPath::from_slashed(collection)?,
            value: JsonPath::from_slashed(value)?,
            labels,
        })
    }

    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }

    /// Extract one [`MetricVal`] per collection item, in item order.
    ///
    /// Fails as a whole if any item lacks a numeric value or a string
    /// label; no partial result is returned.
    pub fn extract(&self, document: &Value) -> ExtractResult<Vec<MetricVal>> {
        let items = match resolve(document, &self.collection)? {
            Resolved::Sequence(items) => items,
            other => {
                return Err(ExtractError::TypeMismatch {
                    role: "collection".to_string(),
                    query: self.collection.to_string(),
                    expected: "sequence",
                    found: other.kind(),
                });
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let val = match resolve(item, &self.value)? {
                Resolved::Number(val) => val,
                other => {
                    return Err(ExtractError::TypeMismatch {
                        role: "value".to_string(),
                        query: self.value.to_string(),
                        expected: "number",
                        found: other.kind(),
                    });
                }
            };

            let mut labels = Vec::with_capacity(self.labels.len());
            for label in &self.labels {
                match resolve(item, &label.path)? {
                    Resolved::String(s) => labels.push(s.to_string()),
                    other => {
                        return Err(ExtractError::TypeMismatch {
                            role: format!("label {}", label.name),
                            query: label.path.to_string(),
                            expected: "string",
                            found: other.kind(),
                        });
                    }
                }
            }

            out.push(MetricVal { val, labels });
        }

        trace!(collection = %self.collection, items = out.len(), "vector extracted");
        Ok(out)
    }
}

/// Compile the queries and extract in one call.
pub fn extract(
    document: &Value,
    collection_query: &str,
    value_query: &str,
    label_queries: &[LabelQuery],
) -> ExtractResult<Vec<MetricVal>> {
    VectorQuery::new(collection_query, value_query, label_queries.to_vec())?.extract(document)
}
