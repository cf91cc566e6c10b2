//! Smooth trend line through a short series.
//!
//! Points are joined with cubic segments whose control points come from
//! Catmull-Rom style tangents (half the vector between each point's neighbours),
//! converted from Hermite to Bezier form by a factor of one third.

use kurbo::{Affine, BezPath, PathEl, Point, Vec2};

use crate::{
    color::ThemeState,
    error::{PipelineError, PipelineResult},
    render::FrameRGBA,
};

/// Coordinate box and value domain the series is scaled into.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SparklineConfig {
    pub width: f64,
    pub height: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub padding: f64,
    pub stroke_width: f64,
}

impl Default for SparklineConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 40.0,
            min_value: 0.0,
            max_value: 100.0,
            padding: 0.0,
            stroke_width: 6.0,
        }
    }
}

impl SparklineConfig {
    /// Linear placement of `values` inside the box. Values outside the domain are
    /// not clamped and land outside the box.
    pub fn map_points(&self, values: &[f64]) -> Vec<Point> {
        let inner_w = self.width - 2.0 * self.padding;
        let inner_h = self.height - 2.0 * self.padding;
        let step = if values.len() > 1 {
            inner_w / (values.len() - 1) as f64
        } else {
            0.0
        };
        let span = self.max_value - self.min_value;

        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let x = self.padding + i as f64 * step;
                let y = self.height - self.padding - (v - self.min_value) * inner_h / span;
                Point::new(x, y)
            })
            .collect()
    }
}

/// Half the vector between each point's neighbours; an edge point stands in for
/// its own missing neighbour.
pub fn tangents(points: &[Point]) -> Vec<Vec2> {
    (0..points.len())
        .map(|i| {
            let prev = if i > 0 { points[i - 1] } else { points[i] };
            let next = points.get(i + 1).copied().unwrap_or(points[i]);
            (next - prev) / 2.0
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SparklineGeometry {
    pub points: Vec<Point>,
    /// Open curve through every point.
    pub line: BezPath,
    /// The same curve closed along the bottom edge of the box.
    pub area: BezPath,
}

impl SparklineGeometry {
    /// Returns `None` when fewer than two values are given: there is no segment to draw.
    pub fn build(values: &[f64], config: &SparklineConfig) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }

        let points = config.map_points(values);
        let tangents = tangents(&points);

        let mut line = BezPath::new();
        line.move_to(points[0]);
        for i in 0..points.len() - 1 {
            let (p1, p2) = (points[i], points[i + 1]);
            let (t1, t2) = (tangents[i], tangents[i + 1]);
            line.curve_to(p1 + t1 / 3.0, p2 - t2 / 3.0, p2);
        }

        let first = points[0];
        let last = points[points.len() - 1];
        let mut area = line.clone();
        area.line_to(Point::new(last.x, config.height));
        area.line_to(Point::new(first.x, config.height));
        area.close_path();

        Some(Self { points, line, area })
    }

    pub fn segment_count(&self) -> usize {
        self.line
            .elements()
            .iter()
            .filter(|el| matches!(el, PathEl::CurveTo(..)))
            .count()
    }

    /// Standalone SVG document: filled area first, then the stroked line on top.
    pub fn to_svg(&self, theme: &ThemeState, config: &SparklineConfig) -> String {
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" "#,
                r#"width="{w}" height="{h}" preserveAspectRatio="none">"#,
                r#"<path fill="{fill}" stroke="none" d="{area}"/>"#,
                r#"<path fill="none" stroke="{stroke}" stroke-width="{sw}" "#,
                r#"stroke-linecap="round" vector-effect="non-scaling-stroke" d="{line}"/>"#,
                "</svg>"
            ),
            w = config.width,
            h = config.height,
            fill = theme.stroke.to_css(),
            area = self.area.to_svg(),
            stroke = theme.text.to_css(),
            sw = config.stroke_width,
            line = self.line.to_svg(),
        )
    }

    /// Draw into a `width`x`height` premultiplied RGBA8 frame. The box is stretched
    /// to the frame while the stroke keeps its width in pixels.
    pub fn rasterize(
        &self,
        theme: &ThemeState,
        config: &SparklineConfig,
        width: u32,
        height: u32,
    ) -> PipelineResult<FrameRGBA> {
        let w16: u16 = width
            .try_into()
            .map_err(|_| PipelineError::raster("sparkline width exceeds u16"))?;
        let h16: u16 = height
            .try_into()
            .map_err(|_| PipelineError::raster("sparkline height exceeds u16"))?;
        if w16 == 0 || h16 == 0 {
            return Ok(FrameRGBA::empty(width, height));
        }

        let to_pixels = Affine::scale_non_uniform(
            f64::from(width) / config.width,
            f64::from(height) / config.height,
        );
        let area = bezpath_to_cpu(&(to_pixels * self.area.clone()));
        let line = bezpath_to_cpu(&(to_pixels * self.line.clone()));

        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            theme.stroke.r,
            theme.stroke.g,
            theme.stroke.b,
            255,
        ));
        ctx.fill_path(&area);

        ctx.set_stroke(
            vello_cpu::kurbo::Stroke::new(config.stroke_width)
                .with_caps(vello_cpu::kurbo::Cap::Round),
        );
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            theme.text.r,
            theme.text.g,
            theme.text.b,
            255,
        ));
        ctx.stroke_path(&line);
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRGBA {
            width,
            height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
