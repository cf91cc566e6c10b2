//! Heat-shimmer distortion applied when the text texture is composited.
//!
//! The WGSL program and [`shimmer_offset`] compute the same displacement so the
//! software compositor matches the GPU one. Displacement is scaled linearly by
//! intensity, so intensity 0 samples the texture unperturbed.

use crate::color::Status;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShimmerParams {
    /// Peak displacement in texture coordinates.
    pub amplitude: f32,
    /// Spatial frequency of the ripple, in radians per unit of texture coordinate.
    pub frequency: f32,
    /// Temporal speed, in radians per second.
    pub speed: f32,
}

impl Default for ShimmerParams {
    fn default() -> Self {
        Self {
            amplitude: 0.006,
            frequency: 40.0,
            speed: 3.0,
        }
    }
}

impl ShimmerParams {
    pub fn is_finite(&self) -> bool {
        self.amplitude.is_finite() && self.frequency.is_finite() && self.speed.is_finite()
    }
}

/// 1.0 only for the exact top-tier label; case matters.
pub fn intensity_for_status(status: &str) -> f32 {
    if status == Status::TOP_TIER_LABEL {
        1.0
    } else {
        0.0
    }
}

/// Per-frame shader inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    /// Seconds since the pipeline started.
    pub time: f32,
    pub intensity: f32,
    pub shimmer: ShimmerParams,
}

impl FrameUniforms {
    pub const SIZE: usize = 32;

    /// Two `vec4<f32>`: (time, intensity, amplitude, frequency), (speed, 0, 0, 0).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let fields = [
            self.time,
            self.intensity,
            self.shimmer.amplitude,
            self.shimmer.frequency,
            self.shimmer.speed,
            0.0,
            0.0,
            0.0,
        ];
        let mut out = [0u8; Self::SIZE];
        for (chunk, v) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// Texture-space displacement for the fragment at `(u, v)`.
pub fn shimmer_offset(u: f32, v: f32, uniforms: &FrameUniforms) -> (f32, f32) {
    let s = &uniforms.shimmer;
    let phase = uniforms.time * s.speed;
    let strength = s.amplitude * uniforms.intensity;
    let dx = (v * s.frequency + phase).sin() * strength;
    let dy = (u * s.frequency * 0.5 + phase * 1.3).cos() * strength * 0.5;
    (dx, dy)
}

pub const SHIMMER_WGSL: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

struct Params {
  a: vec4<f32>,
  b: vec4<f32>,
};

@vertex
fn vs(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
  var o: VsOut;
  o.pos = vec4<f32>(pos, 0.0, 1.0);
  o.uv = uv;
  return o;
}

@group(0) @binding(0) var t_text: texture_2d<f32>;
@group(0) @binding(1) var s_text: sampler;
@group(0) @binding(2) var<uniform> params: Params;

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  let time = params.a.x;
  let intensity = params.a.y;
  let amplitude = params.a.z;
  let frequency = params.a.w;
  let speed = params.b.x;

  let phase = time * speed;
  let strength = amplitude * intensity;
  let dx = sin(in.uv.y * frequency + phase) * strength;
  let dy = cos(in.uv.x * frequency * 0.5 + phase * 1.3) * strength * 0.5;
  return textureSample(t_text, s_text, in.uv + vec2<f32>(dx, dy));
}
"#;
