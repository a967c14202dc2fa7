/// Largest magnitude below which every integral `f64` is printed without a
/// fractional part or exponent.
const MAX_PRINTABLE_INT: f64 = 9_007_199_254_740_992.0;

/// Formats a number the way it is shown to users: integral values print without
/// a decimal point, everything else uses the shortest round-tripping form.
pub fn format_number(value: f64) -> String {
    if is_int(value) {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Returns `true` if the number is finite and has no fractional part.
pub fn is_int(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_PRINTABLE_INT
}

/// Converts a number to a boolean: zero is `false`, everything else is `true`.
pub fn truthy(value: f64) -> bool {
    value != 0.0
}

pub fn from_bool(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}
