//! Metric sources — the extraction half of a configured metric.

use promgate_core::MetricConfig;
use serde_json::Value;

use crate::error::ExtractResult;
use crate::scalar::ScalarQuery;
use crate::vector::{LabelQuery, MetricVal, VectorQuery};

/// How a configured metric turns a document into values.
///
/// Chosen once from the config: labeled metrics and metrics with an
/// `item_path` are vectors, the rest are scalars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSource {
    Scalar(ScalarQuery),
    Vector(VectorQuery),
}

impl MetricSource {
    pub fn from_config(metric: &MetricConfig) -> ExtractResult<Self> {
        if !metric.is_vector() {
            return Ok(MetricSource::Scalar(ScalarQuery::new(&metric.path)?));
        }

        let labels = metric
            .labels
            .iter()
            .map(|l| LabelQuery::new(&l.name, &l.path))
            .collect::<ExtractResult<Vec<_>>>()?;
        let item_path = metric.item_path.as_deref().unwrap_or_default();
        Ok(MetricSource::Vector(VectorQuery::new(
            &metric.path,
            item_path,
            labels,
        )?))
    }

    /// Label names, in tuple order.
    pub fn label_names(&self) -> Vec<&str> {
        match self {
            MetricSource::Scalar(_) => Vec::new(),
            MetricSource::Vector(query) => query.label_names(),
        }
    }

    /// Extract observations. A scalar yields exactly one unlabeled value.
    pub fn extract(&self, document: &Value) -> ExtractResult<Vec<MetricVal>> {
        match self {
            MetricSource::Scalar(query) => Ok(vec![MetricVal {
                val: query.extract(document)?,
                labels: Vec::new(),
            }]),
            MetricSource::Vector(query) => query.extract(document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promgate_core::{LabelConfig, MetricKind};
    use serde_json::json;

    fn metric(path: &str, item_path: Option<&str>, labels: &[(&str, &str)]) -> MetricConfig {
        MetricConfig {
            name: "m".to_string(),
            kind: MetricKind::Gauge,
            description: String::new(),
            http_method: "GET".to_string(),
            url: "/".to_string(),
            path: path.to_string(),
            item_path: item_path.map(str::to_string),
            labels: labels
                .iter()
                .map(|(name, path)| LabelConfig {
                    name: name.to_string(),
                    path: path.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn unlabeled_metric_is_scalar() {
        let source = MetricSource::from_config(&metric("/head/seq", None, &[])).unwrap();
        assert!(matches!(source, MetricSource::Scalar(_)));
        assert!(source.label_names().is_empty());

        let vals = source.extract(&json!({"head": {"seq": 7}})).unwrap();
        assert_eq!(vals, vec![MetricVal { val: 7.0, labels: vec![] }]);
    }

    #[test]
    fn labeled_metric_is_vector() {
        let source =
            MetricSource::from_config(&metric("/wallets", Some("/balance"), &[("id", "/id")]))
                .unwrap();
        assert!(matches!(source, MetricSource::Vector(_)));
        assert_eq!(source.label_names(), vec!["id"]);

        let doc = json!({"wallets": [{"id": "w1", "balance": 10}, {"id": "w2", "balance": 0.5}]});
        let vals = source.extract(&doc).unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[1].labels, vec!["w2"]);
        assert_eq!(vals[1].val, 0.5);
    }

    #[test]
    fn item_path_without_labels_is_vector() {
        let source = MetricSource::from_config(&metric("/blocks", Some("/seq"), &[])).unwrap();
        assert!(matches!(source, MetricSource::Vector(_)));
        assert!(source.label_names().is_empty());

        let vals = source.extract(&json!({"blocks": [{"seq": 1}, {"seq": 2}]})).unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[1], MetricVal { val: 2.0, labels: vec![] });
    }
}
