//! Self-contained PNG data URI for a captured signature.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix of every encoded signature.
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// A rendered signature, encoded as a PNG data URI.
///
/// Usable directly as an image source, and decodable back into PNG bytes for
/// download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedImage {
    data_url: String,
    blank: bool,
}

impl EncodedImage {
    /// Encode a raster as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the PNG encoder fails.
    pub fn from_raster(raster: &RgbaImage) -> Result<Self> {
        let mut png = Cursor::new(Vec::new());
        raster.write_to(&mut png, ImageFormat::Png)?;
        Ok(Self {
            data_url: format!("{DATA_URI_PREFIX}{}", BASE64.encode(png.into_inner())),
            blank: is_blank_raster(raster),
        })
    }

    /// Parse and decode an existing data URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix, base64 payload, or PNG data is invalid.
    pub fn from_data_url(data_url: impl Into<String>) -> Result<Self> {
        let data_url = data_url.into();
        let raster = decode_raster(&data_url)?;
        Ok(Self {
            blank: is_blank_raster(&raster),
            data_url,
        })
    }

    /// The data URI text.
    #[must_use]
    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    /// Whether the image contains no painted pixels.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// The raw PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        png_bytes(&self.data_url)
    }

    /// Decode into a raster.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid PNG.
    pub fn to_raster(&self) -> Result<RgbaImage> {
        decode_raster(&self.data_url)
    }

    /// Write the PNG to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.png_bytes()?)?;
        Ok(())
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_data_url(value)
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> Self {
        image.data_url
    }
}

impl std::fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data_url)
    }
}

fn png_bytes(data_url: &str) -> Result<Vec<u8>> {
    let payload = data_url
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| Error::invalid_image("expected a data:image/png;base64 URI"))?;
    BASE64
        .decode(payload)
        .map_err(|e| Error::invalid_image(format!("bad base64 payload: {e}")))
}

fn decode_raster(data_url: &str) -> Result<RgbaImage> {
    let bytes = png_bytes(data_url)?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| Error::invalid_image(format!("bad PNG data: {e}")))?;
    Ok(image.to_rgba8())
}

pub(crate) fn is_blank_raster(raster: &RgbaImage) -> bool {
    raster.pixels().all(|p| p.0[3] == 0)
}
