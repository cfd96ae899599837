//! Core data types exchanged between the transport, the pipeline and the
//! storage backends.

use serde::{Deserialize, Serialize};

/// One tagged, timestamped vector of values submitted for ingestion.
///
/// Measurements are produced by the transport adapter for every accepted
/// write and consumed exactly once by the batch accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Epoch nanoseconds.
    #[serde(rename = "time")]
    pub timestamp: i64,
    /// Identifier of the time series this measurement belongs to.
    pub tag: String,
    pub values: Vec<f64>,
}

impl Measurement {
    pub fn new(timestamp: i64, tag: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            timestamp,
            tag: tag.into(),
            values,
        }
    }
}

/// A single point returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch nanoseconds.
    #[serde(rename = "time")]
    pub timestamp: i64,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: i64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_time_as_json_field_name() {
        // given
        let json = r#"{"time": 1000, "tag": "tagA", "values": [1.1, 2.2]}"#;

        // when
        let measurement: Measurement = serde_json::from_str(json).unwrap();

        // then
        assert_eq!(measurement, Measurement::new(1000, "tagA", vec![1.1, 2.2]));
    }
}
