use std::fmt;

/// Money is represented as integer minor units (cents) to avoid floating-point precision issues.
/// Ledger amounts are never negative, so the representation is unsigned.
/// For EUR/USD, 1 unit = 100 cents, so €50.00 = 5000 cents.
pub type Cents = u64;

/// Add two amounts, failing instead of wrapping.
pub fn checked_add(a: Cents, b: Cents) -> Result<Cents, AmountError> {
    a.checked_add(b).ok_or(AmountError::Overflow { a, b })
}

/// Subtract `b` from `a`, failing if the result would go below zero.
pub fn checked_sub(a: Cents, b: Cents) -> Result<Cents, AmountError> {
    a.checked_sub(b).ok_or(AmountError::Underflow { a, b })
}

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", 1 -> "0.01"
pub fn format_cents(cents: Cents) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseCentsError::Negative);
    }

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };

    if decimal_str.contains('.') || (units_str.is_empty() && decimal_str.is_empty()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: u64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or reject the fractional part - more than 2 digits would lose precision
    let decimal_cents: u64 = match decimal_str.len() {
        0 => 0,
        1 => {
            decimal_str
                .parse::<u64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        2 => decimal_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
        _ => return Err(ParseCentsError::TooManyDecimals),
    };

    units
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(decimal_cents))
        .ok_or(ParseCentsError::OutOfRange)
}

/// Arithmetic bound violation on ledger amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    Overflow { a: Cents, b: Cents },
    Underflow { a: Cents, b: Cents },
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Overflow { a, b } => write!(f, "{} + {} overflows", a, b),
            AmountError::Underflow { a, b } => write!(f, "{} - {} underflows", a, b),
        }
    }
}

impl std::error::Error for AmountError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Negative,
    TooManyDecimals,
    OutOfRange,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Negative => write!(f, "amount cannot be negative"),
            ParseCentsError::TooManyDecimals => write!(f, "at most 2 decimal places allowed"),
            ParseCentsError::OutOfRange => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
