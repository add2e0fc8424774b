//! Signature capture.
//!
//! A [`StrokeSurface`] turns pointer samples into anti-aliased line segments
//! on an RGBA raster and exports the result as an [`EncodedImage`], a PNG
//! data URI that is stored verbatim in the visitor record.
//!
//! # Example
//!
//! ```
//! use visitlog::signature::{Point, StrokeSurface};
//!
//! let mut surface = StrokeSurface::new(600, 140, 2.0);
//! let changes = surface.subscribe();
//!
//! surface.begin(Point::new(10.0, 70.0));
//! surface.extend(Point::new(120.0, 60.0));
//! let image = surface.end().unwrap();
//!
//! assert!(!image.is_blank());
//! assert_eq!(changes.borrow().as_ref(), Some(&image));
//! ```

mod encoded;
mod surface;

pub use encoded::{EncodedImage, DATA_URI_PREFIX};
pub use surface::{
    Point, StrokeSample, StrokeStyle, StrokeSurface, MAX_LAYOUT_DIMENSION, MAX_PIXEL_RATIO,
};

use std::path::Path;

use crate::error::Result;

/// Load a JSON array of stroke samples from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<StrokeSample>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strokes.json");
        std::fs::write(
            &path,
            r#"[{"x": 1, "y": 1, "pen_down": true}, {"x": 9, "y": 1, "pen_down": false}]"#,
        )
        .unwrap();

        let samples = load_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(!samples[1].pen_down);
    }

    #[test]
    fn test_load_samples_missing_file() {
        assert!(load_samples("/nonexistent/strokes.json").is_err());
    }
}
