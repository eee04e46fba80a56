use super::*;

/// Numeric view of a raw cell value.
///
/// Dual readings such as `"85 | 12"` (live and dead ATP) keep only the first
/// component. Everything outside `[0-9.-]` is dropped before parsing, so
/// `"123.45 mg/L"` becomes `123.45` and qualitative readings like `"OK"`
/// become `None`. Parse failures degrade to `None`.
pub(crate) fn coerce_numeric(raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    let primary = raw.split('|').next().unwrap_or_default();

    let digits = primary
        .chars()
        .filter(|character| character.is_ascii_digit() || *character == '.' || *character == '-')
        .collect::<String>();

    if digits.is_empty() {
        return None;
    }

    digits.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Cleans a cell for the raw-text store: collapses whitespace and maps the
/// blank placeholders some producers emit to an empty string.
pub(crate) fn clean_cell(raw: &str) -> String {
    let value = collapse_whitespace(raw);
    match value.as_str() {
        "." | "None" | "null" => String::new(),
        _ => value,
    }
}
