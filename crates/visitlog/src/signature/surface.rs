//! Freehand stroke capture onto a raster surface.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::encoded::{is_blank_raster, EncodedImage};
use crate::config::SignatureConfig;
use crate::error::Result;

/// A position in layout (CSS-pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal offset from the left edge.
    pub x: f32,
    /// Vertical offset from the top edge.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One pointer sample: a position plus whether the pen is down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeSample {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
    /// `true` while the pointer is pressed.
    pub pen_down: bool,
}

impl StrokeSample {
    /// The sample position.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Fixed rendering policy for strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Line width in layout pixels.
    pub line_width: f32,
    /// Stroke colour (RGB).
    pub color: [u8; 3],
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            color: [0x11, 0x11, 0x11],
        }
    }
}

/// Largest accepted device pixel ratio; larger ratios are clamped.
pub const MAX_PIXEL_RATIO: f32 = 8.0;

/// Largest accepted layout width or height; larger sizes are clamped.
pub const MAX_LAYOUT_DIMENSION: u32 = 4096;

/// A signature capture surface.
///
/// Draws line segments with round caps and joins between successive pen
/// positions. The backing raster is the layout size scaled by the device
/// pixel ratio. Every `end` and `clear` publishes the new image (or `None`)
/// to subscribers.
pub struct StrokeSurface {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    style: StrokeStyle,
    raster: RgbaImage,
    drawing: bool,
    pen: Option<Point>,
    changes: watch::Sender<Option<EncodedImage>>,
}

impl std::fmt::Debug for StrokeSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeSurface")
            .field("layout", &(self.width, self.height))
            .field("raster", &self.raster.dimensions())
            .field("pixel_ratio", &self.pixel_ratio)
            .field("style", &self.style)
            .field("drawing", &self.drawing)
            .field("pen", &self.pen)
            .finish_non_exhaustive()
    }
}

impl StrokeSurface {
    /// Create a blank surface with the given layout size and pixel ratio.
    ///
    /// Non-finite or non-positive ratios fall back to 1. The ratio is
    /// capped at [`MAX_PIXEL_RATIO`] and each layout dimension at
    /// [`MAX_LAYOUT_DIMENSION`].
    #[must_use]
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self::with_style(width, height, pixel_ratio, StrokeStyle::default())
    }

    /// Create a blank surface with a custom stroke style.
    #[must_use]
    pub fn with_style(width: u32, height: u32, pixel_ratio: f32, style: StrokeStyle) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio.min(MAX_PIXEL_RATIO)
        } else {
            1.0
        };
        let width = width.min(MAX_LAYOUT_DIMENSION);
        let height = height.min(MAX_LAYOUT_DIMENSION);
        let (raster_width, raster_height) = (
            scale_dimension(width, pixel_ratio),
            scale_dimension(height, pixel_ratio),
        );
        let (changes, _) = watch::channel(None);

        Self {
            width,
            height,
            pixel_ratio,
            style,
            raster: RgbaImage::new(raster_width, raster_height),
            drawing: false,
            pen: None,
            changes,
        }
    }

    /// Create a surface sized from configuration.
    #[must_use]
    pub fn from_config(config: &SignatureConfig) -> Self {
        Self::new(config.width, config.height, config.pixel_ratio)
    }

    /// Subscribe to change notifications.
    ///
    /// The receiver starts at the most recently published value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<EncodedImage>> {
        self.changes.subscribe()
    }

    /// On-screen layout size.
    #[must_use]
    pub fn layout_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Backing raster size.
    #[must_use]
    pub fn raster_size(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    /// The device pixel ratio in effect.
    #[must_use]
    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// The current pen location, if drawing.
    #[must_use]
    pub fn pen(&self) -> Option<Point> {
        self.pen
    }

    /// Whether nothing has been painted since creation or the last clear.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        is_blank_raster(&self.raster)
    }

    /// Put the pen down at `position`.
    pub fn begin(&mut self, position: Point) {
        trace!(x = position.x, y = position.y, "stroke begin");
        self.drawing = true;
        self.pen = Some(position);
    }

    /// Draw from the current pen location to `position`.
    ///
    /// Ignored unless a stroke is in progress.
    pub fn extend(&mut self, position: Point) {
        if !self.drawing {
            return;
        }
        if let Some(from) = self.pen {
            self.draw_segment(from, position);
        }
        self.pen = Some(position);
    }

    /// Lift the pen, export the raster, and publish it.
    ///
    /// A surface without strokes still exports a valid blank image.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn end(&mut self) -> Result<EncodedImage> {
        self.drawing = false;
        self.pen = None;
        let image = self.export()?;
        debug!(blank = image.is_blank(), "signature stroke finished");
        self.changes.send_replace(Some(image.clone()));
        Ok(image)
    }

    /// Erase the raster and publish `None`.
    pub fn clear(&mut self) {
        let (width, height) = self.raster.dimensions();
        self.raster = RgbaImage::new(width, height);
        self.drawing = false;
        self.pen = None;
        debug!("signature cleared");
        self.changes.send_replace(None);
    }

    /// Encode the current raster without touching capture state.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn export(&self) -> Result<EncodedImage> {
        EncodedImage::from_raster(&self.raster)
    }

    /// Feed one pointer sample.
    ///
    /// Pen-down samples begin or extend a stroke; a pen-up sample ends the
    /// stroke in progress and returns the exported image.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn apply(&mut self, sample: StrokeSample) -> Result<Option<EncodedImage>> {
        match (sample.pen_down, self.drawing) {
            (true, false) => {
                self.begin(sample.point());
                Ok(None)
            }
            (true, true) => {
                self.extend(sample.point());
                Ok(None)
            }
            (false, true) => self.end().map(Some),
            (false, false) => Ok(None),
        }
    }

    /// Feed a recorded sequence of samples, ending any unfinished stroke.
    ///
    /// Returns the last exported image, if any stroke ended.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn replay(&mut self, samples: &[StrokeSample]) -> Result<Option<EncodedImage>> {
        let mut last = None;
        for sample in samples {
            if let Some(image) = self.apply(*sample)? {
                last = Some(image);
            }
        }
        if self.drawing {
            last = Some(self.end()?);
        }
        Ok(last)
    }

    /// Rasterise one segment with round caps, in backing coordinates.
    ///
    /// Zero-length segments paint nothing.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn draw_segment(&mut self, from: Point, to: Point) {
        if from == to {
            return;
        }

        let ratio = self.pixel_ratio;
        let (ax, ay) = (from.x * ratio, from.y * ratio);
        let (bx, by) = (to.x * ratio, to.y * ratio);
        let radius = self.style.line_width * ratio / 2.0;

        let (raster_width, raster_height) = self.raster.dimensions();
        if raster_width == 0 || raster_height == 0 {
            return;
        }
        let max_x = (raster_width - 1) as f32;
        let max_y = (raster_height - 1) as f32;

        let reach = radius + 1.0;
        let x0 = (ax.min(bx) - reach).floor().clamp(0.0, max_x) as u32;
        let x1 = (ax.max(bx) + reach).ceil().clamp(0.0, max_x) as u32;
        let y0 = (ay.min(by) - reach).floor().clamp(0.0, max_y) as u32;
        let y1 = (ay.max(by) + reach).ceil().clamp(0.0, max_y) as u32;

        let [r, g, b] = self.style.color;
        for py in y0..=y1 {
            for px in x0..=x1 {
                let distance =
                    distance_to_segment(px as f32 + 0.5, py as f32 + 0.5, ax, ay, bx, by);
                let coverage = (radius + 0.5 - distance).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let pixel = self.raster.get_pixel_mut(px, py);
                let existing = f32::from(pixel.0[3]) / 255.0;
                let alpha = coverage + existing * (1.0 - coverage);
                *pixel = Rgba([r, g, b, (alpha * 255.0).round() as u8]);
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_dimension(length: u32, ratio: f32) -> u32 {
    (f64::from(length) * f64::from(ratio)).round() as u32
}

fn distance_to_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> StrokeSurface {
        StrokeSurface::new(60, 20, 1.0)
    }

    #[test]
    fn test_begin_has_no_visible_effect() {
        let mut s = surface();
        s.begin(Point::new(10.0, 10.0));

        assert!(s.is_drawing());
        assert_eq!(s.pen(), Some(Point::new(10.0, 10.0)));
        assert!(s.is_blank());
    }

    #[test]
    fn test_extend_draws_and_moves_pen() {
        let mut s = surface();
        s.begin(Point::new(5.0, 10.0));
        s.extend(Point::new(40.0, 10.0));

        assert!(!s.is_blank());
        assert_eq!(s.pen(), Some(Point::new(40.0, 10.0)));
        // A pixel on the line is fully painted with the stroke colour
        let pixel = s.raster.get_pixel(20, 9);
        assert_eq!(pixel.0, [0x11, 0x11, 0x11, 255]);
        // Far from the line stays transparent
        assert_eq!(s.raster.get_pixel(20, 2).0[3], 0);
    }

    #[test]
    fn test_extend_without_begin_is_noop() {
        let mut s = surface();
        s.extend(Point::new(40.0, 10.0));

        assert!(s.is_blank());
        assert!(s.pen().is_none());
    }

    #[test]
    fn test_stationary_extend_stays_blank() {
        let mut s = surface();
        s.begin(Point::new(10.0, 10.0));
        s.extend(Point::new(10.0, 10.0));
        s.extend(Point::new(10.0, 10.0));

        let image = s.end().unwrap();
        assert!(image.is_blank());
    }

    #[test]
    fn test_end_exports_and_notifies() {
        let mut s = surface();
        let rx = s.subscribe();
        assert!(rx.borrow().is_none());

        s.begin(Point::new(5.0, 5.0));
        s.extend(Point::new(30.0, 15.0));
        let image = s.end().unwrap();

        assert!(!image.is_blank());
        assert!(!s.is_drawing());
        assert!(s.pen().is_none());
        assert_eq!(rx.borrow().as_ref(), Some(&image));
    }

    #[test]
    fn test_end_without_strokes_is_blank_but_well_formed() {
        let mut s = surface();
        let image = s.end().unwrap();

        assert!(image.is_blank());
        assert_eq!(image.to_raster().unwrap().dimensions(), (60, 20));
    }

    #[test]
    fn test_clear_resets_and_notifies_none() {
        let mut s = surface();
        let rx = s.subscribe();
        s.begin(Point::new(5.0, 5.0));
        s.extend(Point::new(30.0, 15.0));
        s.end().unwrap();
        assert!(rx.borrow().is_some());

        s.clear();
        assert!(s.is_blank());
        assert!(rx.borrow().is_none());
        assert!(s.export().unwrap().is_blank());
    }

    #[test]
    fn test_clear_mid_stroke_stops_drawing() {
        let mut s = surface();
        s.begin(Point::new(5.0, 5.0));
        s.clear();
        s.extend(Point::new(30.0, 15.0));

        assert!(s.is_blank());
    }

    #[test]
    fn test_export_does_not_change_state() {
        let mut s = surface();
        let rx = s.subscribe();
        s.begin(Point::new(5.0, 5.0));
        s.extend(Point::new(20.0, 5.0));

        let image = s.export().unwrap();
        assert!(!image.is_blank());
        assert!(s.is_drawing());
        assert_eq!(s.pen(), Some(Point::new(20.0, 5.0)));
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn test_pixel_ratio_scales_raster_only() {
        let s = StrokeSurface::new(600, 140, 2.0);
        assert_eq!(s.layout_size(), (600, 140));
        assert_eq!(s.raster_size(), (1200, 280));

        let s = StrokeSurface::new(600, 140, 1.5);
        assert_eq!(s.layout_size(), (600, 140));
        assert_eq!(s.raster_size(), (900, 210));
    }

    #[test]
    fn test_invalid_pixel_ratio_falls_back_to_one() {
        let s = StrokeSurface::new(10, 10, 0.0);
        assert_eq!(s.raster_size(), (10, 10));
        assert!((s.pixel_ratio() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_huge_pixel_ratio_is_clamped() {
        let s = StrokeSurface::new(60, 20, 1.0e6);
        assert!((s.pixel_ratio() - MAX_PIXEL_RATIO).abs() < f32::EPSILON);
        assert_eq!(s.raster_size(), (480, 160));
    }

    #[test]
    fn test_huge_layout_is_clamped() {
        let s = StrokeSurface::new(100_000, 20, 1.0);
        assert_eq!(s.layout_size(), (MAX_LAYOUT_DIMENSION, 20));
        assert_eq!(s.raster_size(), (MAX_LAYOUT_DIMENSION, 20));
    }

    #[test]
    fn test_strokes_are_scaled_by_pixel_ratio() {
        let mut s = StrokeSurface::new(60, 20, 2.0);
        s.begin(Point::new(5.0, 10.0));
        s.extend(Point::new(40.0, 10.0));

        // Layout y=10 maps to backing y=20
        assert_eq!(s.raster.get_pixel(40, 19).0[3], 255);
        assert_eq!(s.raster.get_pixel(40, 10).0[3], 0);
    }

    #[test]
    fn test_round_cap_extends_past_endpoint() {
        let mut s = StrokeSurface::with_style(
            40,
            40,
            1.0,
            StrokeStyle {
                line_width: 8.0,
                ..StrokeStyle::default()
            },
        );
        s.begin(Point::new(10.0, 20.0));
        s.extend(Point::new(30.0, 20.0));

        // Three pixels beyond the end lies inside the round cap
        assert_eq!(s.raster.get_pixel(32, 19).0[3], 255);
    }

    #[test]
    fn test_segment_outside_raster_is_clipped() {
        let mut s = surface();
        s.begin(Point::new(-50.0, -50.0));
        s.extend(Point::new(200.0, -50.0));
        assert!(s.is_blank());
    }

    #[test]
    fn test_apply_and_replay() {
        let mut s = surface();
        let samples = [
            StrokeSample { x: 5.0, y: 5.0, pen_down: true },
            StrokeSample { x: 25.0, y: 5.0, pen_down: true },
            StrokeSample { x: 25.0, y: 5.0, pen_down: false },
            StrokeSample { x: 30.0, y: 15.0, pen_down: true },
            StrokeSample { x: 50.0, y: 15.0, pen_down: true },
        ];

        let image = s.replay(&samples).unwrap().unwrap();
        assert!(!image.is_blank());
        assert!(!s.is_drawing());
        // Second stroke was finished by replay
        assert_eq!(s.raster.get_pixel(40, 14).0[3], 255);
    }

    #[test]
    fn test_pen_up_without_stroke_is_ignored() {
        let mut s = surface();
        let result = s
            .apply(StrokeSample { x: 1.0, y: 1.0, pen_down: false })
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_stroke_sample_deserialize() {
        let samples: Vec<StrokeSample> =
            serde_json::from_str(r#"[{"x": 1.5, "y": 2, "pen_down": true}]"#).unwrap();
        assert_eq!(samples[0].point(), Point::new(1.5, 2.0));
        assert!(samples[0].pen_down);
    }

    #[test]
    fn test_distance_to_segment() {
        assert!((distance_to_segment(5.0, 3.0, 0.0, 0.0, 10.0, 0.0) - 3.0).abs() < 1e-6);
        assert!((distance_to_segment(13.0, 4.0, 0.0, 0.0, 10.0, 0.0) - 5.0).abs() < 1e-6);
    }
}
