//! Outcome band extraction and unit-aware value formatting.
//!
//! Analysis results arrive in more than one shape; the extractor
//! resolves a canonical (p10, p50, p90) triple from whichever shape a
//! record carries. Formatting is pure — no locale or clock input — so
//! rendered values are deterministic and testable.

use crate::model::{AnalysisReport, RunRecord, Units};

/// Placeholder rendered for absent or non-finite values.
pub const PLACEHOLDER: &str = "—";

/// Canonical band triple resolved from a run's result payload.
///
/// Percentiles stay `None` when the underlying field is null or absent —
/// the extractor never substitutes a fabricated value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandSummary {
    pub p10: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub units: Option<Units>,
    pub unit_symbol: Option<String>,
}

impl BandSummary {
    /// Units with the display default applied.
    pub fn units_or_default(&self) -> Units {
        self.units.unwrap_or(Units::Count)
    }
}

/// Resolve a band triple from a run record.
///
/// Tries, in order: the canonical `bands` field, the legacy
/// conservative/likely/optimistic triple, and finally an all-`None`
/// summary for unrecognized payloads. Returns `None` only when the
/// record has no result at all.
pub fn extract_bands(record: &RunRecord) -> Option<BandSummary> {
    let report = record.result.as_ref()?;
    let summary = match report {
        AnalysisReport::Canonical { bands, .. } => BandSummary {
            p10: bands.p10,
            p50: bands.p50,
            p90: bands.p90,
            units: bands.units,
            unit_symbol: bands.unit_symbol.clone(),
        },
        AnalysisReport::Legacy {
            conservative,
            likely,
            optimistic,
            ..
        } => BandSummary {
            p10: *conservative,
            p50: *likely,
            p90: *optimistic,
            units: None,
            unit_symbol: None,
        },
        AnalysisReport::Unrecognized(_) => BandSummary::default(),
    };
    Some(summary)
}

/// Format one band value for display.
///
/// Absent or non-finite values render as an em-dash. Currency and count
/// abbreviate to `K`/`M` at 1,000/1,000,000 with the sign preserved;
/// percent renders one decimal place with a trailing `%`.
pub fn format_value(value: Option<f64>, units: Units, unit_symbol: Option<&str>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    match units {
        Units::Percent => format!("{v:.1}%"),
        Units::Currency => {
            let symbol = unit_symbol.unwrap_or("$");
            let sign = if v < 0.0 { "-" } else { "" };
            format!("{sign}{symbol}{}", abbreviate(v.abs()))
        }
        Units::Count => {
            let sign = if v < 0.0 { "-" } else { "" };
            format!("{sign}{}", abbreviate(v.abs()))
        }
    }
}

/// Abbreviate a non-negative magnitude: 1.5K, 2M, plain below 1,000.
fn abbreviate(abs: f64) -> String {
    if abs >= 1_000_000.0 {
        format!("{}M", trim_mantissa(abs / 1_000_000.0))
    } else if abs >= 1_000.0 {
        format!("{}K", trim_mantissa(abs / 1_000.0))
    } else {
        format!("{}", abs.round() as i64)
    }
}

/// One-decimal mantissa with a trailing `.0` dropped: 1.5 stays, 2.0 → 2.
fn trim_mantissa(v: f64) -> String {
    let s = format!("{v:.1}");
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutcomeBands;

    fn record_with_result(result: AnalysisReport) -> RunRecord {
        RunRecord {
            result: Some(result),
            ..RunRecord::new(0)
        }
    }

    #[test]
    fn canonical_bands_extracted() {
        let record = record_with_result(AnalysisReport::canonical(OutcomeBands {
            p10: Some(100.0),
            p50: Some(250.0),
            p90: Some(900.0),
            units: Some(Units::Currency),
            unit_symbol: Some("€".into()),
        }));

        let bands = extract_bands(&record).unwrap();
        assert_eq!(bands.p50, Some(250.0));
        assert_eq!(bands.units, Some(Units::Currency));
        assert_eq!(bands.unit_symbol.as_deref(), Some("€"));
    }

    #[test]
    fn legacy_triple_maps_to_percentiles() {
        let record =
            record_with_result(AnalysisReport::legacy(Some(10.0), Some(20.0), Some(30.0)));

        let bands = extract_bands(&record).unwrap();
        assert_eq!(bands.p10, Some(10.0));
        assert_eq!(bands.p50, Some(20.0));
        assert_eq!(bands.p90, Some(30.0));
        assert_eq!(bands.units, None);
    }

    #[test]
    fn null_percentile_is_not_fabricated() {
        let record = record_with_result(AnalysisReport::legacy(Some(10.0), None, Some(30.0)));
        let bands = extract_bands(&record).unwrap();
        assert_eq!(bands.p50, None);
    }

    #[test]
    fn no_result_extracts_to_none() {
        let record = RunRecord::new(0);
        assert!(extract_bands(&record).is_none());
    }

    #[test]
    fn unrecognized_result_extracts_to_empty_summary() {
        let record = record_with_result(AnalysisReport::Unrecognized(serde_json::json!({
            "narrative": "only text"
        })));
        let bands = extract_bands(&record).unwrap();
        assert_eq!(bands, BandSummary::default());
    }

    #[test]
    fn missing_value_formats_as_placeholder() {
        assert_eq!(format_value(None, Units::Percent, None), PLACEHOLDER);
        assert_eq!(format_value(Some(f64::NAN), Units::Currency, None), PLACEHOLDER);
    }

    #[test]
    fn currency_abbreviates_and_preserves_sign() {
        assert_eq!(
            format_value(Some(-1500.0), Units::Currency, Some("$")),
            "-$1.5K"
        );
        assert_eq!(format_value(Some(2_000_000.0), Units::Currency, None), "$2M");
        assert_eq!(format_value(Some(999.0), Units::Currency, None), "$999");
    }

    #[test]
    fn currency_uses_custom_symbol() {
        assert_eq!(
            format_value(Some(1200.0), Units::Currency, Some("€")),
            "€1.2K"
        );
    }

    #[test]
    fn count_abbreviates_without_symbol() {
        assert_eq!(format_value(Some(-1500.0), Units::Count, None), "-1.5K");
        assert_eq!(format_value(Some(42.0), Units::Count, None), "42");
    }

    #[test]
    fn percent_renders_one_decimal() {
        assert_eq!(format_value(Some(12.345), Units::Percent, None), "12.3%");
        assert_eq!(format_value(Some(-3.0), Units::Percent, None), "-3.0%");
    }
}
