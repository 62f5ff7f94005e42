//! Single-value extraction.

use serde_json::Value;

use crate::error::{ExtractError, ExtractResult};
use crate::path::{resolve, JsonPath, Resolved};

/// A compiled query for one numeric value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarQuery {
    value: JsonPath,
}

impl ScalarQuery {
    pub fn new(query: &str) -> ExtractResult<Self> {
        Ok(Self {
            value: JsonPath::from_slashed(query)?,
        })
    }

    pub fn extract(&self, document: &Value) -> ExtractResult<f64> {
        match resolve(document, &self.value)? {
            Resolved::Number(val) => Ok(val),
            other => Err(ExtractError::TypeMismatch {
                role: "value".to_string(),
                query: self.value.to_string(),
                expected: "number",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_number() {
        let doc = json!({"head": {"seq": 58894, "fee": 0.5}});
        assert_eq!(ScalarQuery::new("/head/seq").unwrap().extract(&doc).unwrap(), 58894.0);
        assert_eq!(ScalarQuery::new("head/fee").unwrap().extract(&doc).unwrap(), 0.5);
    }

    #[test]
    fn rejects_non_number() {
        let doc = json!({"head": {"hash": "abc", "ok": false}});
        let query = ScalarQuery::new("/head/hash").unwrap();
        assert!(matches!(
            query.extract(&doc),
            Err(ExtractError::TypeMismatch { found: "string", .. })
        ));
        let query = ScalarQuery::new("/head/ok").unwrap();
        assert!(matches!(
            query.extract(&doc),
            Err(ExtractError::TypeMismatch { found: "boolean", .. })
        ));
    }
}
