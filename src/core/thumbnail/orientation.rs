//! EXIF orientation correction.

use image::DynamicImage;

/// Turn an image as stored into the image as it should be viewed.
///
/// Values follow the EXIF `Orientation` tag; anything outside 2..=8 is
/// treated as already upright.
pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        // Transpose
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        // Transverse
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
