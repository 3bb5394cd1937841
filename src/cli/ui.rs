use chrono::{DateTime, Local, Utc};
use console::style;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Rate,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold(),
        StyleType::Rate => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

pub fn format_rate(rate: f64) -> String {
    format!("{rate:.6}")
}

/// Formats a write time in the local timezone.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y/%m/%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate_uses_six_decimals() {
        assert_eq!(format_rate(0.9), "0.900000");
        assert_eq!(format_rate(150.123456789), "150.123457");
    }

    #[test]
    fn test_format_time_shape() {
        let formatted = format_time(Utc::now());
        assert_eq!(formatted.len(), "2026/01/31 23:59:59".len());
        assert_eq!(&formatted[4..5], "/");
    }
}
