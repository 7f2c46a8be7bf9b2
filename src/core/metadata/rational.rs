//! Normalization of EXIF rational values.
//!
//! Writers store the same quantity as an `(num, den)` pair, as a float, or
//! as a pre-reduced `"n/d"` string. All three normalize to one `f64`.

use exif::Value;

/// One rational-ish quantity as found in a metadata container
#[derive(Debug, Clone, PartialEq)]
pub enum RationalValue {
    Ratio { num: i64, den: i64 },
    Float(f64),
    Fraction(String),
}

impl RationalValue {
    /// First component of an EXIF value, if it has a numeric reading
    pub fn from_exif(value: &Value) -> Option<Self> {
        Self::from_exif_at(value, 0)
    }

    /// Component `index` of an EXIF value
    pub fn from_exif_at(value: &Value, index: usize) -> Option<Self> {
        match value {
            Value::Rational(v) => v.get(index).map(|r| RationalValue::Ratio {
                num: i64::from(r.num),
                den: i64::from(r.denom),
            }),
            Value::SRational(v) => v.get(index).map(|r| RationalValue::Ratio {
                num: i64::from(r.num),
                den: i64::from(r.denom),
            }),
            Value::Float(v) => v.get(index).map(|f| RationalValue::Float(f64::from(*f))),
            Value::Double(v) => v.get(index).map(|f| RationalValue::Float(*f)),
            Value::Short(v) => v.get(index).map(|n| RationalValue::Ratio {
                num: i64::from(*n),
                den: 1,
            }),
            Value::Long(v) => v.get(index).map(|n| RationalValue::Ratio {
                num: i64::from(*n),
                den: 1,
            }),
            Value::Ascii(v) if index == 0 => v
                .first()
                .and_then(|bytes| std::str::from_utf8(bytes).ok())
                .map(|s| RationalValue::Fraction(s.to_string())),
            _ => None,
        }
    }

    /// The value as a plain float; `None` for a zero denominator or junk
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RationalValue::Ratio { num, den } => {
                if *den == 0 {
                    None
                } else {
                    Some(*num as f64 / *den as f64)
                }
            }
            RationalValue::Float(f) => f.is_finite().then_some(*f),
            RationalValue::Fraction(text) => Self::parse_fraction(text)?.to_f64(),
        }
    }

    /// Parse `"n/d"` into a ratio, or a bare decimal into a float
    fn parse_fraction(text: &str) -> Option<RationalValue> {
        let text = text.trim_end_matches('\0').trim();
        match text.split_once('/') {
            Some((num, den)) => Some(RationalValue::Ratio {
                num: num.trim().parse().ok()?,
                den: den.trim().parse().ok()?,
            }),
            None => text.parse::<f64>().ok().map(RationalValue::Float),
        }
    }

    /// Reduced `(num, den)` with a positive denominator, when the value is
    /// an exact ratio
    fn reduced(&self) -> Option<(i64, i64)> {
        match self {
            RationalValue::Ratio { num, den } => {
                if *den == 0 {
                    return None;
                }
                let sign = if (*num < 0) != (*den < 0) { -1 } else { 1 };
                let (n, d) = (num.checked_abs()?, den.checked_abs()?);
                let g = gcd(n, d).max(1);
                Some((sign * n / g, d / g))
            }
            RationalValue::Fraction(text) => Self::parse_fraction(text)?.reduced(),
            RationalValue::Float(_) => None,
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Render a float without trailing zeros, at most six decimals
pub fn format_decimal(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Human-legible exposure time: `"1/250"` when the value is a clean
/// fraction of a second, whole seconds as `"2"`, otherwise a decimal.
///
/// Negative, infinite and zero-denominator values are unparseable.
pub fn exposure_string(value: &RationalValue) -> Option<String> {
    let seconds = value.to_f64()?;
    if seconds < 0.0 {
        return None;
    }

    if let Some((num, den)) = value.reduced() {
        return Some(match (num, den) {
            (0, _) => "0".to_string(),
            (n, 1) => n.to_string(),
            (1, d) => format!("1/{}", d),
            _ => format_decimal(seconds),
        });
    }

    if seconds == 0.0 {
        return Some("0".to_string());
    }
    if seconds.fract() == 0.0 {
        return Some(format!("{}", seconds as i64));
    }
    if seconds < 1.0 {
        let reciprocal = 1.0 / seconds;
        let rounded = reciprocal.round();
        if (reciprocal - rounded).abs() <= 1e-6 * reciprocal {
            return Some(format!("1/{}", rounded as i64));
        }
    }
    Some(format_decimal(seconds))
}
