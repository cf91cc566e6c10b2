use kurbo::Rect;

/// Measured box and computed font size of one placeholder element, in logical
/// units relative to the surface origin.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextAnchor {
    pub bounding_box: Rect,
    pub font_size: f64,
}

/// Point-in-time capture of where the host laid out the status and value
/// elements. Always replaced whole, never patched.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutSnapshot {
    pub status: TextAnchor,
    pub value: TextAnchor,
}

/// Host capability that reads the live layout of the text placeholders.
pub trait LayoutMeasurer {
    fn measure_layout(&self) -> Option<LayoutSnapshot>;
}

impl<F> LayoutMeasurer for F
where
    F: Fn() -> Option<LayoutSnapshot>,
{
    fn measure_layout(&self) -> Option<LayoutSnapshot> {
        self()
    }
}

/// Measurer for hosts without placeholder elements; the raster uses its
/// proportional defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLayout;

impl LayoutMeasurer for NoLayout {
    fn measure_layout(&self) -> Option<LayoutSnapshot> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One size observation of the mounting container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceObservation {
    pub logical_width: f64,
    pub logical_height: f64,
    pub device_pixel_ratio: f64,
}

impl SurfaceObservation {
    pub fn new(logical_width: f64, logical_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            device_pixel_ratio,
        }
    }

    /// Unknown or nonsensical ratios count as 1.
    pub fn device_pixel_ratio(&self) -> f64 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }

    pub fn pixel_size(&self) -> PixelSize {
        let dpr = self.device_pixel_ratio();
        let scale = |v: f64| -> u32 {
            if v.is_finite() && v > 0.0 {
                (v * dpr).floor() as u32
            } else {
                0
            }
        };
        PixelSize::new(scale(self.logical_width), scale(self.logical_height))
    }
}
