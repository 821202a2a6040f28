//! Human-readable sizes and durations for log fields

/// Renders a byte count: `512b`, `1.5kb`, `3mb`, `2.1gb`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["b", "kb", "mb", "gb", "tb"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{}{}", trim_decimal(value), UNITS[unit])
    }
}

/// Renders a duration in milliseconds: `250ms`, `1.2s`, `3.5m`.
pub fn format_millis(millis: u64) -> String {
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{}s", trim_decimal(millis as f64 / 1_000.0))
    } else {
        format!("{}m", trim_decimal(millis as f64 / 60_000.0))
    }
}

fn trim_decimal(value: f64) -> String {
    let rendered = format!("{:.1}", value);
    rendered
        .strip_suffix(".0")
        .map(str::to_owned)
        .unwrap_or(rendered)
}
