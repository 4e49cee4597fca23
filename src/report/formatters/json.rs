use crate::report::SoilReport;

/// JSON formatter for soil reports
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format report as pretty-printed JSON
    pub fn format(report: &SoilReport) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(report)
    }

    /// Format report as compact JSON (no whitespace)
    pub fn format_compact(report: &SoilReport) -> Result<String, serde_json::Error> {
        serde_json::to_string(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionResponse;
    use crate::report::ReportSession;
    use serde_json::{json, Value};

    fn report() -> SoilReport {
        let extraction: ExtractionResponse = serde_json::from_value(json!({
            "analyses": [{"id": 1, "info": {"paddock": "Home", "crop": "Oats"}, "nutrients": [
                {"name": "Zinc (DTPA)", "current": 1, "ideal": 5, "unit": "ppm"},
                {"name": "Calcium", "current": 81.05, "ideal": 64, "unit": "%"}
            ]}]
        }))
        .unwrap();
        let mut session = ReportSession::default();
        session.load(&extraction).unwrap();
        session.build_report().unwrap()
    }

    #[test]
    fn test_format_json() {
        let pretty = JsonFormatter::format(&report()).unwrap();
        assert!(pretty.contains('\n'));

        let parsed: Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed["paddock"], "Home");
        assert_eq!(parsed["crop"], "Oats");
        assert_eq!(parsed["nutrients"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["soil_amendments"][0]["fertilizer"], "Zinc Sulfate");
    }

    #[test]
    fn test_format_compact() {
        let report = report();
        let compact = JsonFormatter::format_compact(&report).unwrap();
        assert!(!compact.contains('\n'));

        let compact: Value = serde_json::from_str(&compact).unwrap();
        let pretty: Value = serde_json::from_str(&JsonFormatter::format(&report).unwrap()).unwrap();
        assert_eq!(compact, pretty);
        assert_eq!(compact["overall"]["stars"], report.overall.stars);
    }
}
