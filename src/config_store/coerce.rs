//! Best-effort conversion of stored values into Rust scalars.
//!
//! Every conversion returns `None` instead of failing; the typed accessors
//! turn that into the caller's default. This hides malformed configuration
//! from the program, which is the contract the accessors promise.

use std::time::Duration;

use toml::Value;

/// Conversion from a stored configuration value.
pub trait FromValue: Sized {
    /// Converts `value`, or returns `None` when it has the wrong shape or
    /// does not fit the target type.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::String(s) => parse_bool(s),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Datetime(dt) => Some(dt.to_string()),
            Value::Array(_) | Value::Table(_) => None,
        }
    }
}

/// Reads any numeric-looking value as an `i128`, which holds every `i64`
/// and `u64` without loss. Floats only count when they have no fraction.
fn as_wide_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(i) => Some(i128::from(*i)),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            // Bounded by the u64/i64 range check done by the caller.
            if *f >= -(2f64.powi(64)) && *f <= 2f64.powi(64) {
                Some(*f as i128)
            } else {
                None
            }
        }
        Value::Boolean(b) => Some(i128::from(u8::from(*b))),
        Value::String(s) => parse_wide_integer(s.trim()),
        _ => None,
    }
}

fn parse_wide_integer(s: &str) -> Option<i128> {
    if let Ok(i) = s.parse::<i128>() {
        return Some(i);
    }

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.starts_with(['-', '+']) {
        return None;
    }

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else {
        digits
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() <= 2f64.powi(64))
            .map(|f| f as i128)
    }?;

    Some(if negative { -parsed } else { parsed })
}

macro_rules! integer_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    as_wide_integer(value).and_then(|wide| <$ty>::try_from(wide).ok())
                }
            }
        )*
    };
}

integer_from_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Boolean(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        let wide = f64::from_value(value)?;
        let narrow = wide as f32;

        // A finite f64 that overflows f32 is out of range, not infinity.
        if wide.is_finite() && !narrow.is_finite() {
            return None;
        }

        Some(narrow)
    }
}

impl FromValue for Duration {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => parse_duration(s),
            Value::Integer(secs) => u64::try_from(*secs).ok().map(Duration::from_secs),
            Value::Float(secs) => Duration::try_from_secs_f64(*secs).ok(),
            _ => None,
        }
    }
}

/// Converts every element of an array, or a comma separated string, into `T`.
///
/// Returns `None` if any element fails so that callers fall back to their
/// defaults as a whole instead of seeing a partially converted list.
pub fn slice_from_value<T: FromValue>(value: &Value) -> Option<Vec<T>> {
    match value {
        Value::Array(items) => items.iter().map(T::from_value).collect(),
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => s
            .split(',')
            .map(|part| T::from_value(&Value::String(part.trim().to_string())))
            .collect(),
        Value::Table(_) => None,
        scalar => T::from_value(scalar).map(|item| vec![item]),
    }
}

/// Parses the textual booleans accepted in configuration files and the
/// environment.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a duration string such as `"30s"`, `"1h30m"`, `"1.5s"` or `"250ms"`.
///
/// A bare number is read as seconds. Units: `ns`, `us`/`µs`, `ms`, `s`,
/// `m`/`min`, `h`, `d`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total_nanos = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let amount: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match rest[..unit_len].trim() {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" | "sec" => 1e9,
            "m" | "min" => 60e9,
            "h" => 3600e9,
            "d" => 86_400e9,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total_nanos += amount * nanos_per_unit;
    }

    if !total_nanos.is_finite() || total_nanos < 0.0 || total_nanos >= u64::MAX as f64 {
        return None;
    }

    Some(Duration::from_nanos(total_nanos.round() as u64))
}

/// Formats a duration in the compact form [`parse_duration`] reads back.
///
/// ```
/// use std::time::Duration;
/// use cmdopt::config_store::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// assert_eq!(format_duration(Duration::ZERO), "0s");
/// ```
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    let mut out = String::new();
    let mut secs = d.as_secs();
    let nanos = d.subsec_nanos();

    for (unit, size) in [("h", 3600u64), ("m", 60), ("s", 1)] {
        let amount = secs / size;
        if amount > 0 {
            out.push_str(&format!("{amount}{unit}"));
            secs %= size;
        }
    }

    if nanos > 0 {
        if nanos % 1_000_000 == 0 {
            out.push_str(&format!("{}ms", nanos / 1_000_000));
        } else if nanos % 1_000 == 0 {
            out.push_str(&format!("{}us", nanos / 1_000));
        } else {
            out.push_str(&format!("{nanos}ns"));
        }
    }

    out
}

/// Guesses the type of a raw string (environment values, CLI text).
///
/// Booleans only match `true`/`false` here so that `"1"` stays a number and
/// `"yes"` stays text.
pub fn infer_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();

    match trimmed {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        _ => {}
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }

    Value::String(raw.to_string())
}
