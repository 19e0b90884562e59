//! Formatting utilities (Telegram HTML escaping, currency rendering).

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render an amount in minor units as a two-decimal euro string.
pub fn format_eur(minor_units: i64) -> String {
    format!("{:.2}€", minor_units as f64 / 100.0)
}

/// Free-text field for display: `---` when absent or empty, escaped otherwise.
pub fn text_or_dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => escape_html(v),
        _ => "---".to_string(),
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
