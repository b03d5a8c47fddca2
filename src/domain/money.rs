use thiserror::Error;

/// Money is represented as integer cents so repeated sums never drift.
/// 1 unit = 100 cents, so 4000.00 = 400000 cents.
pub type Cents = i64;

/// Format cents as a plain decimal string.
/// Example: 400000 -> "4000.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount into cents.
///
/// Accepts "4000", "4000.5", "4000.50" and ".50". Amounts with more than two
/// fractional digits are rejected instead of being rounded.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    if digits.is_empty() {
        return Err(ParseCentsError::InvalidFormat(input.to_string()));
    }

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
        || (units_str.is_empty() && fraction_str.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat(input.to_string()));
    }
    if fraction_str.len() > 2 {
        return Err(ParseCentsError::TooPrecise(input.to_string()));
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat(input.to_string()))?
    };
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<i64>().unwrap_or(0) * 10,
        _ => fraction_str.parse::<i64>().unwrap_or(0),
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(|| ParseCentsError::Overflow(input.to_string()))?;

    Ok(if negative { -cents } else { cents })
}

/// Sum of `amounts`, or `None` if the total does not fit in `Cents`.
pub fn checked_sum<I>(amounts: I) -> Option<Cents>
where
    I: IntoIterator<Item = Cents>,
{
    amounts
        .into_iter()
        .try_fold(0 as Cents, |acc, amount| acc.checked_add(amount))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("invalid money format: '{0}'")]
    InvalidFormat(String),

    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(400000), "4000.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-1234), "-12.34");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("4000"), Ok(400000));
        assert_eq!(parse_cents("4000.5"), Ok(400050));
        assert_eq!(parse_cents("4000.05"), Ok(400005));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents(" 12.34 "), Ok(1234));
        assert_eq!(parse_cents("-7.10"), Ok(-710));
    }

    #[test]
    fn test_parse_cents_rejects_extra_precision() {
        assert!(matches!(
            parse_cents("10.999"),
            Err(ParseCentsError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
        assert!(parse_cents(".").is_err());
        assert!(parse_cents("1e5").is_err());
    }

    #[test]
    fn test_checked_sum() {
        assert_eq!(checked_sum([]), Some(0));
        assert_eq!(checked_sum([100, 250, 1]), Some(351));
        assert_eq!(checked_sum([i64::MAX, 1]), None);
        assert_eq!(checked_sum([i64::MAX / 2 + 1, i64::MAX / 2 + 1]), None);
    }
}
