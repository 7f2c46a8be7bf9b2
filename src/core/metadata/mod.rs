//! # Metadata Module
//!
//! Extracts EXIF metadata from photo files into a normalized record.
//!
//! ## Extracted Fields
//! - Camera make, model and lens
//! - ISO, f-number, exposure time, focal length
//! - GPS latitude/longitude (signed decimal degrees)
//! - Original capture timestamp
//! - Orientation and pixel dimensions
//!
//! Every field is optional. Files without metadata, or with a truncated or
//! corrupt container, yield an empty record and never an error.

mod gps;
mod rational;
mod tags;

pub use gps::{coordinate, dms_to_decimal, position, Axis};
pub use rational::{exposure_string, format_decimal, RationalValue};
pub use tags::TagName;

use chrono::{DateTime, Local, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// Textual layouts accepted for capture timestamps, tried in order
const TIMESTAMP_LAYOUTS: [&str; 2] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Normalized photo metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Camera make (e.g., "Apple", "Canon")
    pub camera_make: Option<String>,
    /// Camera model (e.g., "iPhone 15 Pro")
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub iso: Option<u32>,
    pub f_number: Option<f64>,
    /// Exposure time as written by a photographer, e.g. "1/250" or "0.3"
    pub exposure_time: Option<String>,
    /// Focal length in millimetres
    pub focal_length: Option<f64>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    /// Original capture date/time, camera local time
    pub taken_at: Option<NaiveDateTime>,
    /// EXIF orientation (1-8, where 1 is normal)
    pub orientation: Option<u16>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MetadataRecord {
    /// Check if any metadata was extracted
    pub fn has_data(&self) -> bool {
        *self != MetadataRecord::default()
    }

    /// Build a record from raw `(tag, value)` pairs of the primary image.
    ///
    /// The first occurrence of a tag wins; unknown tags are ignored.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (Tag, &'a Value)>,
    {
        let mut by_name: BTreeMap<TagName, &Value> = BTreeMap::new();
        for (tag, value) in fields {
            if let Some(name) = TagName::from_tag(tag) {
                by_name.entry(name).or_insert(value);
            }
        }
        let get = |name: TagName| by_name.get(&name).copied();

        let rational = |name: TagName| {
            get(name)
                .and_then(RationalValue::from_exif)
                .and_then(|r| r.to_f64())
                .filter(|v| *v > 0.0)
        };

        let taken_at = [
            TagName::DateTimeOriginal,
            TagName::DateTimeDigitized,
            TagName::DateTime,
        ]
        .into_iter()
        .filter_map(|name| get(name))
        .find_map(|value| get_string_value(value).and_then(|s| parse_timestamp(&s)));

        let gps = position(
            get(TagName::GpsLatitude),
            get(TagName::GpsLatitudeRef),
            get(TagName::GpsLongitude),
            get(TagName::GpsLongitudeRef),
        );

        MetadataRecord {
            camera_make: get(TagName::Make).and_then(get_string_value),
            camera_model: get(TagName::Model).and_then(get_string_value),
            lens: get(TagName::LensModel).and_then(get_string_value),
            iso: get(TagName::Iso).and_then(get_u32_value).filter(|v| *v > 0),
            f_number: rational(TagName::FNumber),
            exposure_time: get(TagName::ExposureTime)
                .and_then(RationalValue::from_exif)
                .and_then(|r| exposure_string(&r)),
            focal_length: rational(TagName::FocalLength),
            gps_latitude: gps.map(|(lat, _)| lat),
            gps_longitude: gps.map(|(_, lon)| lon),
            taken_at,
            orientation: get(TagName::Orientation).and_then(get_orientation_value),
            width: get(TagName::PixelXDimension)
                .or_else(|| get(TagName::ImageWidth))
                .and_then(get_u32_value),
            height: get(TagName::PixelYDimension)
                .or_else(|| get(TagName::ImageLength))
                .and_then(get_u32_value),
        }
    }

    /// Build a record from a decoded EXIF container
    pub fn from_exif(exif: &exif::Exif) -> Self {
        Self::from_fields(
            exif.fields()
                .filter(|field| field.ifd_num == In::PRIMARY)
                .map(|field| (field.tag, &field.value)),
        )
    }
}

fn read_exif(path: &Path) -> Result<exif::Exif, exif::Error> {
    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    Reader::new().read_from_container(&mut bufreader)
}

/// Extract metadata from a photo file.
///
/// Never fails: a file that cannot be opened or decoded produces an empty
/// record. Corrupt containers are logged as warnings; files that simply
/// carry no metadata are logged at debug level.
pub fn extract_metadata(path: &Path) -> MetadataRecord {
    match read_exif(path) {
        Ok(exif) => MetadataRecord::from_exif(&exif),
        Err(exif::Error::NotFound(_)) => {
            debug!(path = %path.display(), "no embedded metadata");
            MetadataRecord::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable metadata, using empty record");
            MetadataRecord::default()
        }
    }
}

/// Read only the orientation tag (1-8) of a photo file
pub fn read_orientation(path: &Path) -> Option<u16> {
    let exif = read_exif(path).ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    get_orientation_value(&field.value)
}

/// Best guess at when a photo was taken.
///
/// Prefers the extracted capture timestamp, falls back to the file's
/// modification time, and gives up quietly when neither is available.
pub fn guess_taken_at(path: &Path, record: &MetadataRecord) -> Option<NaiveDateTime> {
    record.taken_at.or_else(|| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(|modified| DateTime::<Local>::from(modified).naive_local())
    })
}

/// Parse a capture timestamp in any accepted layout
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
}

/// Helper to extract u32 from various EXIF integer types
fn get_u32_value(value: &Value) -> Option<u32> {
    match value {
        Value::Long(vec) => vec.first().copied(),
        Value::Short(vec) => vec.first().map(|v| *v as u32),
        Value::Byte(vec) => vec.first().map(|v| *v as u32),
        _ => None,
    }
}

fn get_orientation_value(value: &Value) -> Option<u16> {
    get_u32_value(value)
        .filter(|v| (1..=8).contains(v))
        .map(|v| v as u16)
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
