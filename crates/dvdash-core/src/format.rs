/// Rendered in place of any value the repeater did not report.
pub const SENTINEL: &str = "-";

/// Render a ratio that is already expressed in percent, e.g. `12.345` → `"12.35%"`.
///
/// Rounds half away from zero at the second decimal.
pub fn percent(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    // avoid "-0.00%"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.2}%")
}

/// Render a signal strength as whole decibel-milliwatts, e.g. `-94` → `"-94dBm"`.
pub fn dbm(value: f64) -> String {
    let rounded = value.round() as i64;
    format!("{rounded}dBm")
}

pub fn percent_or_sentinel(value: Option<f64>) -> String {
    value.map_or_else(|| SENTINEL.to_string(), percent)
}

pub fn dbm_or_sentinel(value: Option<f64>) -> String {
    value.map_or_else(|| SENTINEL.to_string(), dbm)
}
