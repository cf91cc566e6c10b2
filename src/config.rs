use std::path::Path;

use crate::{
    color::ColorRamp,
    effect::ShimmerParams,
    error::{PipelineError, PipelineResult},
    render::{BackendKind, RenderSettings},
    sparkline::SparklineConfig,
    text_raster::TextStyle,
};

/// Every tunable of the overlay and the trend line. Missing sections take the
/// dashboard defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub backend: BackendKind,
    /// Straight-alpha color behind the composited text. Transparent when unset.
    pub clear_rgba: Option<[u8; 4]>,
    pub theme: ColorRamp,
    pub text: TextStyle,
    pub sparkline: SparklineConfig,
    pub effect: ShimmerParams,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::config(format!("parse config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::config(format!("read '{}': {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let range = &self.theme.range;
        if !(range.low.is_finite() && range.high.is_finite()) || range.low >= range.high {
            return Err(PipelineError::config(
                "theme range must satisfy low < high",
            ));
        }

        let s = &self.sparkline;
        if !(s.width > 0.0 && s.height > 0.0) {
            return Err(PipelineError::config(
                "sparkline width/height must be > 0",
            ));
        }
        if !(s.min_value.is_finite() && s.max_value.is_finite()) || s.min_value >= s.max_value {
            return Err(PipelineError::config(
                "sparkline domain must satisfy min_value < max_value",
            ));
        }
        if !(s.padding >= 0.0 && 2.0 * s.padding < s.width.min(s.height)) {
            return Err(PipelineError::config(
                "sparkline padding must be >= 0 and leave an inner box",
            ));
        }
        if !(s.stroke_width.is_finite() && s.stroke_width >= 0.0) {
            return Err(PipelineError::config("sparkline stroke_width must be >= 0"));
        }

        if !self.effect.is_finite() {
            return Err(PipelineError::config("effect parameters must be finite"));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            clear_rgba: self.clear_rgba,
        }
    }
}
