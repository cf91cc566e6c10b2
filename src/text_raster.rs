//! Off-screen raster holding the status word and the reading.

use kurbo::Point;

use crate::{
    color::{Rgb8, ThemeState},
    error::{PipelineError, PipelineResult},
    layout::{LayoutSnapshot, PixelSize},
    render::RasterView,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font file registered for both lines. Without one, lines are planned but
    /// no glyphs are drawn.
    pub font_path: Option<std::path::PathBuf>,
    pub status_weight: f32,
    pub value_weight: f32,
    /// Straight-alpha RGBA; never follows the theme.
    pub value_color: [u8; 4],
    /// Fall back to a sans-serif system face when `font_path` is unset or fails.
    pub system_fonts: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            status_weight: 500.0,
            value_weight: 300.0,
            value_color: [0, 0, 0, 128],
            system_fonts: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<[u8; 4]> for TextBrushRgba8 {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineRole {
    Status,
    Value,
}

/// Where and how one line is drawn, in raster pixels. The anchor is the
/// horizontal centre and the vertical middle of the line box.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub role: LineRole,
    pub text: String,
    pub font_size: f64,
    pub weight: f32,
    pub anchor: Point,
    pub color: TextBrushRgba8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPlan {
    pub status: TextLine,
    pub value: Option<TextLine>,
}

impl TextPlan {
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        std::iter::once(&self.status).chain(self.value.as_ref())
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: Option<String>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            family_name: None,
        }
    }

    fn register_font(&mut self, font_bytes: &[u8], index: u32) -> PipelineResult<()> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .iter()
            .find(|(_, fonts)| fonts.iter().any(|f| f.index() == index))
            .or_else(|| families.first())
            .map(|(id, _)| *id)
            .ok_or_else(|| PipelineError::raster("no font families registered from font bytes"))?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PipelineError::raster("registered font family has no name"))?
            .to_string();
        self.family_name = Some(family_name);
        Ok(())
    }

    fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        weight: f32,
        brush: TextBrushRgba8,
    ) -> PipelineResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PipelineError::raster("font size must be finite and > 0"));
        }
        let family_name = self
            .family_name
            .clone()
            .ok_or_else(|| PipelineError::raster("no font registered"))?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(weight),
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

struct LoadedFont {
    engine: TextLayoutEngine,
    data: vello_cpu::peniko::FontData,
}

pub struct TextRaster {
    style: TextStyle,
    size: PixelSize,
    pixmap: Option<vello_cpu::Pixmap>,
    device_pixel_ratio: f64,
    status: String,
    value: String,
    layout: Option<LayoutSnapshot>,
    status_color: Rgb8,
    font: Option<LoadedFont>,
    allocations: u64,
}

impl TextRaster {
    pub fn new(style: TextStyle) -> Self {
        Self {
            style,
            size: PixelSize::default(),
            pixmap: None,
            device_pixel_ratio: 1.0,
            status: String::new(),
            value: String::new(),
            layout: None,
            status_color: ThemeState::default().text,
            font: None,
            allocations: 0,
        }
    }

    /// Loads `style.font_path` when set, then falls back to a system sans-serif
    /// face. Only a host with no usable font at all leaves the raster without glyphs.
    pub fn from_style(style: TextStyle) -> Self {
        let path = style.font_path.clone();
        let system_fonts = style.system_fonts;
        let mut raster = Self::new(style);
        if let Some(path) = path {
            match std::fs::read(&path) {
                Ok(bytes) => match raster.set_font(bytes) {
                    Ok(()) => return raster,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "font rejected");
                    }
                },
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "font unreadable");
                }
            }
        }
        if !system_fonts {
            return raster;
        }
        match system_font_face() {
            Some((bytes, index)) => {
                if let Err(err) = raster.set_font_face(bytes, index) {
                    tracing::warn!(%err, "system font rejected; drawing without glyphs");
                }
            }
            None => tracing::warn!("no system font found; drawing without glyphs"),
        }
        raster
    }

    pub fn set_font(&mut self, font_bytes: Vec<u8>) -> PipelineResult<()> {
        self.set_font_face(font_bytes, 0)
    }

    /// Register face `index` of a font file or collection.
    pub fn set_font_face(&mut self, font_bytes: Vec<u8>, index: u32) -> PipelineResult<()> {
        let mut engine = TextLayoutEngine::new();
        engine.register_font(&font_bytes, index)?;
        let data =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), index);
        self.font = Some(LoadedFont { engine, data });
        self.draw();
        Ok(())
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Reallocate the backing pixmap to `width`x`height` device pixels and redraw.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = PixelSize::new(width, height);
        self.pixmap = match (u16::try_from(width), u16::try_from(height)) {
            _ if self.size.is_empty() => None,
            (Ok(w), Ok(h)) => Some(vello_cpu::Pixmap::new(w, h)),
            _ => {
                tracing::warn!(width, height, "text raster exceeds u16 pixels; dropping surface");
                None
            }
        };
        self.allocations += 1;
        self.draw();
    }

    pub fn update(&mut self, status: String, value: String, layout: Option<LayoutSnapshot>) {
        self.status = status;
        self.value = value;
        self.layout = layout;
        self.draw();
    }

    /// Swap in a fresh layout without redrawing; the caller follows with
    /// [`TextRaster::resize`] or [`TextRaster::draw`].
    pub fn replace_layout(&mut self, layout: Option<LayoutSnapshot>) {
        self.layout = layout;
    }

    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f64) {
        self.device_pixel_ratio = device_pixel_ratio;
    }

    pub fn set_status_color(&mut self, color: Rgb8) {
        if self.status_color != color {
            self.status_color = color;
            self.draw();
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn layout(&self) -> Option<&LayoutSnapshot> {
        self.layout.as_ref()
    }

    /// Last requested size, including zero-sized ones.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// How many times the backing pixmap has been reallocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixmap
            .as_ref()
            .map(|p| p.data_as_u8_slice())
            .unwrap_or(&[])
    }

    pub fn view(&self) -> RasterView<'_> {
        match &self.pixmap {
            Some(p) => RasterView {
                width: u32::from(p.width()),
                height: u32::from(p.height()),
                data: p.data_as_u8_slice(),
            },
            None => RasterView {
                width: 0,
                height: 0,
                data: &[],
            },
        }
    }

    /// Line placement for the current state, or `None` for a zero-sized raster.
    pub fn plan(&self) -> Option<TextPlan> {
        if self.pixmap.is_none() {
            return None;
        }
        let width = f64::from(self.size.width);
        let height = f64::from(self.size.height);
        let center_x = width / 2.0;
        let dpr = self.device_pixel_ratio;

        let (status_size, status_y, value_size, value_y) = match &self.layout {
            Some(layout) => (
                layout.status.font_size * dpr,
                layout.status.bounding_box.center().y * dpr,
                layout.value.font_size * dpr,
                layout.value.bounding_box.center().y * dpr,
            ),
            None => {
                let status_size = ((width * 12.0 / 100.0).floor() + 16.0).max(24.0);
                let value_size = ((width * 6.0 / 100.0).floor() + 8.0).max(16.0);
                let center_y = height * 35.0 / 100.0;
                (
                    status_size,
                    center_y - status_size * 0.6,
                    value_size,
                    center_y + value_size * 0.8,
                )
            }
        };

        let status = TextLine {
            role: LineRole::Status,
            text: self.status.clone(),
            font_size: status_size,
            weight: self.style.status_weight,
            anchor: Point::new(center_x, status_y),
            color: self.status_color.with_alpha(255).into(),
        };
        let value = (!self.value.is_empty()).then(|| TextLine {
            role: LineRole::Value,
            text: self.value.clone(),
            font_size: value_size,
            weight: self.style.value_weight,
            anchor: Point::new(center_x, value_y),
            color: self.style.value_color.into(),
        });
        Some(TextPlan { status, value })
    }

    /// Repaint the pixmap from the current state. Repeated calls with unchanged
    /// state produce identical pixels.
    pub fn draw(&mut self) {
        let Some(plan) = self.plan() else {
            return;
        };
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        pixmap.data_as_u8_slice_mut().fill(0);

        let Some(font) = self.font.as_mut() else {
            return;
        };

        let mut ctx = vello_cpu::RenderContext::new(pixmap.width(), pixmap.height());
        for line in plan.lines() {
            if line.text.is_empty() {
                continue;
            }
            if let Err(err) = fill_line(&mut ctx, font, line) {
                tracing::warn!(role = ?line.role, %err, "text line skipped");
            }
        }
        ctx.flush();
        ctx.render_to_pixmap(pixmap);
    }
}

/// Bytes and face index of a regular sans-serif system face, or of any face
/// when no common sans-serif family is installed. Scanned once per process.
fn system_font_face() -> Option<(Vec<u8>, u32)> {
    static FACE: std::sync::OnceLock<Option<(Vec<u8>, u32)>> = std::sync::OnceLock::new();
    FACE.get_or_init(|| {
        use usvg::fontdb::{Database, Family, Query};

        let mut db = Database::new();
        db.load_system_fonts();
        let query = Query {
            families: &[
                Family::SansSerif,
                Family::Name("DejaVu Sans"),
                Family::Name("Liberation Sans"),
                Family::Name("Noto Sans"),
                Family::Name("Helvetica"),
            ],
            ..Default::default()
        };
        let id = db.query(&query).or_else(|| db.faces().next().map(|f| f.id))?;
        let face = db.with_face_data(id, |data, index| (data.to_vec(), index));
        tracing::debug!(faces = db.len(), found = face.is_some(), "system fonts scanned");
        face
    })
    .clone()
}

fn fill_line(
    ctx: &mut vello_cpu::RenderContext,
    font: &mut LoadedFont,
    line: &TextLine,
) -> PipelineResult<()> {
    let layout =
        font.engine
            .layout_line(&line.text, line.font_size as f32, line.weight, line.color)?;

    let origin_x = line.anchor.x - f64::from(layout.width()) / 2.0;
    let origin_y = line.anchor.y - f64::from(layout.height()) / 2.0;
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin_x, origin_y)));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        line.color.r,
        line.color.g,
        line.color.b,
        line.color.a,
    ));

    for layout_line in layout.lines() {
        for item in layout_line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(&font.data)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    Ok(())
}
