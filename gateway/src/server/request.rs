//! HTTP request types for the gateway server.

use common::Measurement;
use serde::Deserialize;

use crate::error::Error;
use crate::model::SeriesRequest;

/// Decode a `/save` body: `{ "time": <ns>, "tag": "...", "values": [...] }`.
pub fn parse_measurement(body: &[u8]) -> Result<Measurement, Error> {
    serde_json::from_slice(body)
        .map_err(|e| Error::InvalidInput(format!("malformed measurement: {}", e)))
}

/// Query parameters for `/api`.
///
/// Kept as strings so that missing and non-numeric values are reported with
/// the offending parameter name instead of a generic extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SeriesParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub tag: Option<String>,
}

impl SeriesParams {
    pub fn into_request(self) -> Result<SeriesRequest, Error> {
        let start = required_i64("start", self.start)?;
        let end = required_i64("end", self.end)?;
        let tag = self
            .tag
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| Error::InvalidInput("missing 'tag' parameter".to_string()))?;
        Ok(SeriesRequest::new(tag, start, end))
    }
}

fn required_i64(name: &str, value: Option<String>) -> Result<i64, Error> {
    let value = value.ok_or_else(|| Error::InvalidInput(format!("missing '{}' parameter", name)))?;
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("'{}' must be an integer, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(start: Option<&str>, end: Option<&str>, tag: Option<&str>) -> SeriesParams {
        SeriesParams {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            tag: tag.map(str::to_string),
        }
    }

    #[test]
    fn should_build_series_request() {
        // given
        let params = params(Some("100"), Some("200"), Some("cpu"));

        // when
        let request = params.into_request().unwrap();

        // then
        assert_eq!(request, SeriesRequest::new("cpu", 100, 200));
    }

    #[rstest]
    #[case::missing_start(None, Some("2"), Some("cpu"), "start")]
    #[case::missing_end(Some("1"), None, Some("cpu"), "end")]
    #[case::missing_tag(Some("1"), Some("2"), None, "tag")]
    #[case::empty_tag(Some("1"), Some("2"), Some(""), "tag")]
    #[case::non_integer_start(Some("abc"), Some("2"), Some("cpu"), "start")]
    #[case::non_integer_end(Some("1"), Some("2.5"), Some("cpu"), "end")]
    fn should_reject_bad_params(
        #[case] start: Option<&str>,
        #[case] end: Option<&str>,
        #[case] tag: Option<&str>,
        #[case] offending: &str,
    ) {
        // when
        let result = params(start, end, tag).into_request();

        // then
        match result {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains(offending), "{}", msg),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn should_parse_measurement_body() {
        // given
        let body = br#"{"time": 1700000000000000000, "tag": "cpu", "values": [1.5, 2.5]}"#;

        // when
        let measurement = parse_measurement(body).unwrap();

        // then
        assert_eq!(
            measurement,
            Measurement::new(1_700_000_000_000_000_000, "cpu", vec![1.5, 2.5])
        );
    }

    #[rstest]
    #[case::not_json(b"hello".as_slice())]
    #[case::missing_tag(br#"{"time": 1, "values": []}"#.as_slice())]
    #[case::string_time(br#"{"time": "now", "tag": "cpu", "values": []}"#.as_slice())]
    fn should_reject_malformed_measurement(#[case] body: &[u8]) {
        // when
        let result = parse_measurement(body);

        // then
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
