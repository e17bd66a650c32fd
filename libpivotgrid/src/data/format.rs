//! Number format masks such as `#,##0.00` or `0.0%` applied to raw cell text.

/// Formats a raw cell value with a measure's format mask.
///
/// Only the first section of the mask (before `;`) is used. Bracketed tokens like colors
/// or conditions are ignored. Text that is not a number, and values without a mask, are
/// returned unchanged.
#[must_use]
pub fn format_measure_value(raw: &str, format: Option<&str>) -> String {
    let (Some(format), Ok(value)) = (format, raw.parse::<f64>()) else {
        return raw.to_string();
    };
    let mask = strip_brackets(format.split(';').next().unwrap_or_default());
    let Some(pattern) = NumberPattern::parse(&mask) else {
        return raw.to_string();
    };

    let value = if pattern.percent { value * 100. } else { value };
    let fixed = format!("{:.*}", pattern.decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };
    let integer = if pattern.grouping {
        group_thousands(integer)
    } else {
        integer.to_string()
    };
    let negative = value < 0. && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&pattern.prefix);
    out.push_str(&integer);
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out.push_str(&pattern.suffix);
    out
}

#[derive(Debug, PartialEq)]
struct NumberPattern {
    prefix: String,
    suffix: String,
    decimals: usize,
    grouping: bool,
    percent: bool,
}

impl NumberPattern {
    fn parse(mask: &str) -> Option<Self> {
        let is_pattern = |c: char| matches!(c, '#' | '0' | ',' | '.');
        let start = mask.find(is_pattern)?;
        let len = mask[start..]
            .find(|c: char| !is_pattern(c))
            .unwrap_or(mask.len() - start);
        let pattern = &mask[start..start + len];

        Some(Self {
            prefix: mask[..start].to_string(),
            suffix: mask[start + len..].to_string(),
            decimals: pattern
                .split_once('.')
                .map(|(_, f)| f.chars().filter(|c| matches!(c, '#' | '0')).count())
                .unwrap_or(0),
            grouping: pattern.contains(','),
            percent: mask.contains('%'),
        })
    }
}

fn strip_brackets(mask: &str) -> String {
    let mut depth = 0usize;
    mask.chars()
        .filter(|c| match c {
            '[' => {
                depth += 1;
                false
            }
            ']' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

fn group_thousands(digits: &str) -> String {
    let head = digits.len() % 3;
    let mut groups = vec![];
    if head > 0 {
        groups.push(&digits[..head]);
    }
    groups.extend(
        digits.as_bytes()[head..]
            .chunks(3)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok()),
    );
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_format_keeps_raw_text() {
        assert_eq!(format_measure_value("1234.5", None), "1234.5");
        assert_eq!(format_measure_value("", Some("#,##0")), "");
    }

    #[test]
    fn grouping_and_decimals() {
        assert_eq!(format_measure_value("1234567.891", Some("#,##0.00")), "1,234,567.89");
        assert_eq!(format_measure_value("999", Some("#,##0")), "999");
        assert_eq!(format_measure_value("-1000", Some("#,##0")), "-1,000");
    }

    #[test]
    fn percent_and_affixes() {
        assert_eq!(format_measure_value("0.256", Some("#,##0.0%")), "25.6%");
        assert_eq!(format_measure_value("12", Some("$#,##0.00")), "$12.00");
    }

    #[test]
    fn brackets_and_sections_are_ignored() {
        assert_eq!(
            format_measure_value("-3.5", Some("[red]#,##0.0;[green]#,##0.0")),
            "-3.5"
        );
    }

    #[test]
    fn rounded_negative_zero_has_no_sign() {
        assert_eq!(format_measure_value("-0.001", Some("0.0")), "0.0");
    }
}
