//! Report codecs
//!
//! Text (JSON) round-trips through the scoped bucket store; binary
//! (bincode) is write-only and feeds durable records.

use tally_common::Result;

use crate::model::Report;

/// Encode a report for the scoped bucket store
pub fn encode_text(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Decode a report previously written by [`encode_text`]
pub fn decode_text(text: &str) -> Result<Report> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a report for a durable record
pub fn encode_binary(report: &Report) -> Result<Vec<u8>> {
    Ok(bincode::serialize(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Measurement;
    use crate::model::MetricKey;
    use tally_common::{HourWindow, TallyError, HOUR_MS, MINUTE_MS};

    fn sample() -> Report {
        let mut report = Report::new("retail", HourWindow::containing_millis(HOUR_MS * 7));
        let key = MetricKey::new("orderSvc", "latency");
        let m = Measurement::parse("T", "120.0").unwrap().unwrap();
        report.apply(key.clone(), &m, HOUR_MS * 7 + 4 * MINUTE_MS).unwrap();
        let m = Measurement::parse("S,C", "5,12.5").unwrap().unwrap();
        report
            .apply(MetricKey::new("orderSvc", "amount"), &m, HOUR_MS * 7)
            .unwrap();
        report
    }

    #[test]
    fn test_text_restores_report() {
        let report = sample();
        let text = encode_text(&report).unwrap();
        assert!(text.contains("orderSvc:Metric:latency"));
        assert_eq!(decode_text(&text).unwrap(), report);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_text("<metric-report/>"),
            Err(TallyError::Serialization(_))
        ));
    }

    #[test]
    fn test_binary_is_compact() {
        let report = sample();
        let bytes = encode_binary(&report).unwrap();
        assert!(!bytes.is_empty());
        assert!(bytes.len() < encode_text(&report).unwrap().len());
    }
}
