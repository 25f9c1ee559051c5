//! Field coercion from raw CSV text to typed nullable values
//!
//! An empty field means "not provided" and always coerces to `None`; it is
//! never a distinct empty value. Every function here is total: malformed
//! input yields `None` instead of an error.

const TRUTHY: [&str; 5] = ["true", "t", "1", "yes", "y"];
const FALSY: [&str; 5] = ["false", "f", "0", "no", "n"];

/// Coerce a boolean token, case-insensitively.
///
/// Unrecognized tokens such as `"maybe"` map to `None`.
pub fn to_bool(value: Option<&str>) -> Option<bool> {
    let value = value.filter(|v| !v.is_empty())?.to_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Some(true)
    } else if FALSY.contains(&value.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Coerce an integer.
///
/// Accepts anything that reads as a finite whole number, including
/// exponent and decimal forms like `"1e3"` or `"42.0"`. `NaN`, infinities,
/// fractions and values outside `i64` map to `None`.
pub fn to_int(value: Option<&str>) -> Option<i64> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;

    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }

    let n = value.parse::<f64>().ok().filter(|n| n.is_finite())?;
    // i64::MAX is not representable as f64; the bound is exclusive
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// Coerce a string, mapping empty to `None`.
pub fn to_nullable(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
