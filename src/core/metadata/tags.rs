//! Fixed dictionary from EXIF tag identifiers to the fields we keep.

use exif::Tag;

/// Semantic name of a tag the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagName {
    Make,
    Model,
    LensModel,
    Iso,
    FNumber,
    ExposureTime,
    FocalLength,
    DateTimeOriginal,
    DateTimeDigitized,
    DateTime,
    GpsLatitude,
    GpsLatitudeRef,
    GpsLongitude,
    GpsLongitudeRef,
    Orientation,
    PixelXDimension,
    PixelYDimension,
    ImageWidth,
    ImageLength,
}

impl TagName {
    /// Resolve a tag identifier; unknown tags resolve to `None`
    pub fn from_tag(tag: Tag) -> Option<Self> {
        let name = match tag {
            Tag::Make => TagName::Make,
            Tag::Model => TagName::Model,
            Tag::LensModel => TagName::LensModel,
            Tag::PhotographicSensitivity => TagName::Iso,
            Tag::FNumber => TagName::FNumber,
            Tag::ExposureTime => TagName::ExposureTime,
            Tag::FocalLength => TagName::FocalLength,
            Tag::DateTimeOriginal => TagName::DateTimeOriginal,
            Tag::DateTimeDigitized => TagName::DateTimeDigitized,
            Tag::DateTime => TagName::DateTime,
            Tag::GPSLatitude => TagName::GpsLatitude,
            Tag::GPSLatitudeRef => TagName::GpsLatitudeRef,
            Tag::GPSLongitude => TagName::GpsLongitude,
            Tag::GPSLongitudeRef => TagName::GpsLongitudeRef,
            Tag::Orientation => TagName::Orientation,
            Tag::PixelXDimension => TagName::PixelXDimension,
            Tag::PixelYDimension => TagName::PixelYDimension,
            Tag::ImageWidth => TagName::ImageWidth,
            Tag::ImageLength => TagName::ImageLength,
            _ => return None,
        };
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_resolve() {
        assert_eq!(TagName::from_tag(Tag::Make), Some(TagName::Make));
        assert_eq!(TagName::from_tag(Tag::GPSLatitude), Some(TagName::GpsLatitude));
        assert_eq!(
            TagName::from_tag(Tag::PhotographicSensitivity),
            Some(TagName::Iso)
        );
    }

    #[test]
    fn unknown_tags_are_ignored() {
        assert_eq!(TagName::from_tag(Tag::Software), None);
        assert_eq!(TagName::from_tag(Tag(exif::Context::Tiff, 0xBEEF)), None);
    }
}
