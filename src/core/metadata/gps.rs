//! GPS coordinate decoding.

use super::rational::RationalValue;
use exif::Value;

/// Which coordinate a degrees/minutes/seconds triple describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(&self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    /// Sign for a hemisphere reference, `None` if the reference does not
    /// belong to this axis
    fn sign(&self, reference: char) -> Option<f64> {
        match (self, reference.to_ascii_uppercase()) {
            (Axis::Latitude, 'N') | (Axis::Longitude, 'E') => Some(1.0),
            (Axis::Latitude, 'S') | (Axis::Longitude, 'W') => Some(-1.0),
            _ => None,
        }
    }
}

/// `deg + min/60 + sec/3600`, negated for the southern/western hemisphere
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, negative: bool) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if negative {
        -value
    } else {
        value
    }
}

fn reference_char(value: &Value) -> Option<char> {
    match value {
        Value::Ascii(v) => v
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).chars().next()),
        _ => None,
    }
}

/// Signed decimal degrees from a DMS value and its hemisphere reference.
///
/// Any missing or unreadable component yields `None` rather than a
/// partial coordinate.
pub fn coordinate(value: Option<&Value>, reference: Option<&Value>, axis: Axis) -> Option<f64> {
    let value = value?;
    let sign = axis.sign(reference_char(reference?)?)?;

    let mut parts = [0.0f64; 3];
    for (index, part) in parts.iter_mut().enumerate() {
        let component = RationalValue::from_exif_at(value, index)?.to_f64()?;
        if component < 0.0 {
            return None;
        }
        *part = component;
    }

    let decimal = dms_to_decimal(parts[0], parts[1], parts[2], sign < 0.0);
    (decimal.abs() <= axis.limit()).then_some(decimal)
}

/// Latitude and longitude as one fix.
///
/// A position with only one readable axis is no position at all, so both
/// are `None` unless both decode.
pub fn position(
    latitude: Option<&Value>,
    latitude_ref: Option<&Value>,
    longitude: Option<&Value>,
    longitude_ref: Option<&Value>,
) -> Option<(f64, f64)> {
    let lat = coordinate(latitude, latitude_ref, Axis::Latitude)?;
    let lon = coordinate(longitude, longitude_ref, Axis::Longitude)?;
    Some((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::Rational;

    fn dms(d: u32, m: u32, s: u32) -> Value {
        Value::Rational(vec![
            Rational { num: d, denom: 1 },
            Rational { num: m, denom: 1 },
            Rational { num: s, denom: 1 },
        ])
    }

    fn reference(r: &str) -> Value {
        Value::Ascii(vec![r.as_bytes().to_vec()])
    }

    #[test]
    fn north_is_positive() {
        let lat = coordinate(Some(&dms(40, 26, 46)), Some(&reference("N")), Axis::Latitude)
            .unwrap();
        assert!((lat - 40.4461).abs() < 1e-4);
    }

    #[test]
    fn south_is_negative() {
        let lat = coordinate(Some(&dms(40, 26, 46)), Some(&reference("S")), Axis::Latitude)
            .unwrap();
        assert!((lat + 40.4461).abs() < 1e-4);
    }

    #[test]
    fn west_longitude_is_negative() {
        let lon = coordinate(Some(&dms(79, 58, 56)), Some(&reference("W")), Axis::Longitude)
            .unwrap();
        assert!((lon + 79.9822).abs() < 1e-4);
    }

    #[test]
    fn missing_reference_is_unset() {
        assert_eq!(coordinate(Some(&dms(40, 26, 46)), None, Axis::Latitude), None);
    }

    #[test]
    fn partial_triple_is_unset() {
        let partial = Value::Rational(vec![
            Rational { num: 40, denom: 1 },
            Rational { num: 26, denom: 1 },
        ]);
        assert_eq!(
            coordinate(Some(&partial), Some(&reference("N")), Axis::Latitude),
            None
        );
    }

    #[test]
    fn zero_denominator_component_is_unset() {
        let broken = Value::Rational(vec![
            Rational { num: 40, denom: 1 },
            Rational { num: 26, denom: 0 },
            Rational { num: 46, denom: 1 },
        ]);
        assert_eq!(
            coordinate(Some(&broken), Some(&reference("N")), Axis::Latitude),
            None
        );
    }

    #[test]
    fn reference_from_wrong_axis_is_unset() {
        assert_eq!(
            coordinate(Some(&dms(40, 26, 46)), Some(&reference("E")), Axis::Latitude),
            None
        );
    }

    #[test]
    fn out_of_range_latitude_is_unset() {
        assert_eq!(
            coordinate(Some(&dms(95, 0, 0)), Some(&reference("N")), Axis::Latitude),
            None
        );
    }

    #[test]
    fn position_needs_both_axes() {
        let lat = dms(40, 26, 46);
        let lon = dms(79, 58, 56);
        let (n, w) = (reference("N"), reference("W"));

        let (la, lo) = position(Some(&lat), Some(&n), Some(&lon), Some(&w)).unwrap();
        assert!((la - 40.4461).abs() < 1e-4);
        assert!((lo + 79.9822).abs() < 1e-4);

        assert_eq!(position(Some(&lat), Some(&n), None, None), None);
        assert_eq!(position(None, None, Some(&lon), Some(&w)), None);
        assert_eq!(position(Some(&lat), Some(&n), Some(&lon), None), None);
    }
}
