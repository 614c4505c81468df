//! Shared utilities

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Elapsed time: `850мс`, `2.3с`, `1.5м`
pub fn format_duration(millis: u64) -> String {
    if millis < 1_000 {
        format!("{}мс", millis)
    } else if millis < 60_000 {
        format!("{:.1}с", millis as f64 / 1_000.0)
    } else {
        format!("{:.1}м", millis as f64 / 60_000.0)
    }
}

/// Ruble amount with two decimals
pub fn format_cost(cost: f64) -> String {
    format!("{:.2}₽", cost)
}

pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello...");
        assert_eq!(truncate_chars("привет мир", 6), "привет...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(850), "850мс");
        assert_eq!(format_duration(2_340), "2.3с");
        assert_eq!(format_duration(90_000), "1.5м");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "0.00₽");
        assert_eq!(format_cost(1.236), "1.24₽");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.5k");
        assert_eq!(format_number(2_000_000), "2.0M");
    }
}
