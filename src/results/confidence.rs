//! Confidence normalisation
//!
//! OCR engines report confidence as a fraction, a percentage number or a
//! percentage string. Everything is mapped into `[0, 1]`.

use serde_json::Value;

/// Normalise a numeric confidence
///
/// Values above 1 are read as percentages. Negative values (Tesseract reports
/// `-1` for "no score") and non-finite values mean "unknown".
pub fn normalize(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    Some(fraction.clamp(0.0, 1.0))
}

/// Parse a confidence given as text: `"87%"`, `"87"` or `"0.87"`
pub fn parse_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Some(percent) = trimmed.strip_suffix('%') {
        let value: f64 = percent.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        return Some((value / 100.0).clamp(0.0, 1.0));
    }
    trimmed.parse::<f64>().ok().and_then(normalize)
}

/// Parse a confidence from loosely typed JSON
pub fn parse_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(normalize),
        Value::String(s) => parse_str(s),
        _ => None,
    }
}

/// Render a confidence the way exports show it (`"87%"`)
pub fn format_percent(confidence: Option<f64>) -> String {
    confidence
        .map(|c| format!("{}%", (c * 100.0).round() as i64))
        .unwrap_or_default()
}
