//! Request and response types of the read path.

use common::Sample;
use serde::Serialize;

/// A windowed series read: samples of `tag` with `start < timestamp <= end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub tag: String,
    pub start: i64,
    pub end: i64,
}

impl SeriesRequest {
    pub fn new(tag: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            tag: tag.into(),
            start,
            end,
        }
    }
}

/// Downsampled samples of one tag over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    #[serde(rename = "tagName")]
    pub tag: String,
    pub start: i64,
    pub end: i64,
    pub samples: Vec<Sample>,
}

impl QueryResult {
    /// True when sample timestamps never decrease.
    pub fn is_time_ordered(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_with_wire_field_names() {
        // given
        let result = QueryResult {
            tag: "cpu".to_string(),
            start: 10,
            end: 20,
            samples: vec![Sample::new(15, vec![1.5, 2.0])],
        };

        // when
        let json = serde_json::to_value(&result).unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({
                "tagName": "cpu",
                "start": 10,
                "end": 20,
                "samples": [{"time": 15, "values": [1.5, 2.0]}]
            })
        );
    }

    #[test]
    fn should_detect_out_of_order_samples() {
        // given
        let mut result = QueryResult {
            tag: "cpu".to_string(),
            start: 0,
            end: 10,
            samples: vec![Sample::new(1, vec![]), Sample::new(1, vec![]), Sample::new(5, vec![])],
        };
        assert!(result.is_time_ordered());

        // when
        result.samples.push(Sample::new(3, vec![]));

        // then
        assert!(!result.is_time_ordered());
    }
}
