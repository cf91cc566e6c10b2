use rayon::prelude::*;

use crate::{
    effect::{FrameUniforms, shimmer_offset},
    error::{PipelineError, PipelineResult},
    render::{CompositeBackend, FrameRGBA, RasterView, RenderSettings},
};

pub type PremulRgba8 = [u8; 4];

struct CpuTexture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Software stand-in for the GPU program: samples the uploaded texture with the
/// shimmer displacement and composites it over the clear color.
pub struct CpuCompositor {
    settings: RenderSettings,
    texture: Option<CpuTexture>,
    target: FrameRGBA,
}

impl CpuCompositor {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            texture: None,
            target: FrameRGBA::empty(0, 0),
        }
    }

    fn clear_color(&self) -> PremulRgba8 {
        self.settings
            .clear_rgba
            .map(|[r, g, b, a]| premul_rgba8(r, g, b, a))
            .unwrap_or([0, 0, 0, 0])
    }
}

impl CompositeBackend for CpuCompositor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resize_target(&mut self, width: u32, height: u32) -> PipelineResult<()> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| PipelineError::raster("render target size overflow"))?;
        self.target = FrameRGBA {
            width,
            height,
            data: vec![0; len],
            premultiplied: true,
        };
        Ok(())
    }

    fn upload_texture(&mut self, raster: RasterView<'_>) -> PipelineResult<()> {
        if raster.data.len() != raster.width as usize * raster.height as usize * 4 {
            return Err(PipelineError::raster(
                "texture upload byte length mismatch",
            ));
        }
        match &mut self.texture {
            Some(t) if t.width == raster.width && t.height == raster.height => {
                t.data.copy_from_slice(raster.data);
            }
            _ => {
                self.texture = Some(CpuTexture {
                    width: raster.width,
                    height: raster.height,
                    data: raster.data.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn draw(&mut self, uniforms: &FrameUniforms) -> PipelineResult<()> {
        let clear = self.clear_color();
        let (width, height) = (self.target.width, self.target.height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let row_bytes = width as usize * 4;

        let Some(tex) = self.texture.as_ref().filter(|t| t.width > 0 && t.height > 0) else {
            for px in self.target.data.chunks_exact_mut(4) {
                px.copy_from_slice(&clear);
            }
            return Ok(());
        };

        // Output pixel centres map onto texel centres when sizes match.
        let scale_x = tex.width as f32 / width as f32;
        let scale_y = tex.height as f32 / height as f32;

        self.target
            .data
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                let v = (y as f32 + 0.5) / height as f32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let u = (x as f32 + 0.5) / width as f32;
                    let (du, dv) = shimmer_offset(u, v, uniforms);
                    let sx = (x as f32 + 0.5) * scale_x - 0.5 + du * tex.width as f32;
                    let sy = (y as f32 + 0.5) * scale_y - 0.5 + dv * tex.height as f32;
                    let src = sample_bilinear(tex, sx, sy);
                    px.copy_from_slice(&over(clear, src, 1.0));
                }
            });
        Ok(())
    }

    fn readback_rgba8(&mut self) -> PipelineResult<FrameRGBA> {
        Ok(self.target.clone())
    }
}

/// Clamp-to-edge bilinear sample in texel space (texel centres at integers).
fn sample_bilinear(tex: &CpuTexture, sx: f32, sy: f32) -> PremulRgba8 {
    let max_x = (tex.width - 1) as f32;
    let max_y = (tex.height - 1) as f32;
    let sx = sx.clamp(0.0, max_x);
    let sy = sy.clamp(0.0, max_y);

    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(tex.width - 1);
    let y1 = (y0 + 1).min(tex.height - 1);

    let texel = |x: u32, y: u32| -> [f32; 4] {
        let i = (y as usize * tex.width as usize + x as usize) * 4;
        let p = &tex.data[i..i + 4];
        [
            f32::from(p[0]),
            f32::from(p[1]),
            f32::from(p[2]),
            f32::from(p[3]),
        ]
    };
    let (a, b, c, d) = (texel(x0, y0), texel(x1, y0), texel(x0, y1), texel(x1, y1));

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * fx;
        let bottom = c[i] + (d[i] - c[i]) * fx;
        out[i] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub(crate) fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
    let af = (a as u16) + 1;
    let premul = |c: u8| -> u8 { (((c as u16) * af) >> 8) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::ShimmerParams;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let on = (x / 2 + y / 2) % 2 == 0;
                data.extend_from_slice(if on {
                    &[200, 40, 40, 255]
                } else {
                    &[0, 0, 60, 128]
                });
            }
        }
        data
    }

    fn uniforms(intensity: f32) -> FrameUniforms {
        FrameUniforms {
            time: 3.25,
            intensity,
            shimmer: ShimmerParams {
                amplitude: 0.05,
                frequency: 40.0,
                speed: 3.0,
            },
        }
    }

    #[test]
    fn translucent_text_blends_over_opaque_clear() {
        let clear = premul_rgba8(0, 0, 255, 255);
        let text = [100, 0, 0, 128];
        assert_eq!(over(clear, text, 1.0), [100, 0, 127, 255]);

        let mut c = CpuCompositor::new(RenderSettings {
            clear_rgba: Some([0, 0, 255, 255]),
        });
        c.resize_target(1, 1).unwrap();
        c.upload_texture(RasterView {
            width: 1,
            height: 1,
            data: &text,
        })
        .unwrap();
        c.draw(&uniforms(0.0)).unwrap();
        assert_eq!(c.readback_rgba8().unwrap().data, vec![100, 0, 127, 255]);
    }

    #[test]
    fn translucent_clear_is_stored_premultiplied() {
        let mut c = CpuCompositor::new(RenderSettings {
            clear_rgba: Some([255, 0, 0, 128]),
        });
        c.resize_target(2, 2).unwrap();
        c.draw(&uniforms(1.0)).unwrap();
        let frame = c.readback_rgba8().unwrap();
        assert!(frame.premultiplied);
        assert!(frame.data.chunks_exact(4).all(|px| px == [128, 0, 0, 128]));
    }

    #[test]
    fn zero_intensity_reproduces_texture_exactly() {
        let (w, h) = (16, 12);
        let tex = checker(w, h);
        let mut c = CpuCompositor::new(RenderSettings::default());
        c.resize_target(w, h).unwrap();
        c.upload_texture(RasterView {
            width: w,
            height: h,
            data: &tex,
        })
        .unwrap();
        c.draw(&uniforms(0.0)).unwrap();
        let frame = c.readback_rgba8().unwrap();
        assert_eq!(frame.data, tex);
    }

    #[test]
    fn full_intensity_displaces_pixels_but_keeps_alpha_range() {
        let (w, h) = (16, 12);
        let tex = checker(w, h);
        let mut c = CpuCompositor::new(RenderSettings::default());
        c.resize_target(w, h).unwrap();
        c.upload_texture(RasterView {
            width: w,
            height: h,
            data: &tex,
        })
        .unwrap();
        c.draw(&uniforms(1.0)).unwrap();
        let frame = c.readback_rgba8().unwrap();
        assert_ne!(frame.data, tex);
        assert!(frame.data.chunks_exact(4).all(|px| px[3] >= 128));
    }

    #[test]
    fn missing_texture_draws_clear_color() {
        let mut c = CpuCompositor::new(RenderSettings {
            clear_rgba: Some([255, 255, 255, 255]),
        });
        c.resize_target(4, 4).unwrap();
        c.draw(&uniforms(0.0)).unwrap();
        let frame = c.readback_rgba8().unwrap();
        assert!(frame.data.iter().all(|&b| b == 255));
    }

    #[test]
    fn upload_rejects_short_buffers() {
        let mut c = CpuCompositor::new(RenderSettings::default());
        let err = c.upload_texture(RasterView {
            width: 4,
            height: 4,
            data: &[0; 12],
        });
        assert!(err.is_err());
    }
}
