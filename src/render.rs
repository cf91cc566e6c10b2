use crate::{
    effect::FrameUniforms,
    error::{PipelineError, PipelineResult},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Vec::new(),
            premultiplied: true,
        }
    }
}

/// Borrowed premultiplied RGBA8 pixels of the text raster.
#[derive(Clone, Copy, Debug)]
pub struct RasterView<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

/// GPU-side half of the pipeline: one texture, one full-screen quad, one program.
///
/// A frame is `upload_texture` (only when the raster changed) followed by
/// exactly one `draw`, both on the caller's thread.
pub trait CompositeBackend {
    fn name(&self) -> &'static str;

    /// Reallocate the render target. Never called with a zero dimension.
    fn resize_target(&mut self, width: u32, height: u32) -> PipelineResult<()>;

    fn upload_texture(&mut self, raster: RasterView<'_>) -> PipelineResult<()>;

    /// Clear the target, bind the quad and draw it once with `uniforms`.
    fn draw(&mut self, uniforms: &FrameUniforms) -> PipelineResult<()>;

    fn readback_rgba8(&mut self) -> PipelineResult<FrameRGBA>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderSettings {
    pub clear_rgba: Option<[u8; 4]>,
}

/// Acquire a backend. A GPU request in a build without the `gpu` feature
/// reports an unavailable context.
pub fn create_backend(
    kind: BackendKind,
    settings: &RenderSettings,
) -> PipelineResult<Box<dyn CompositeBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::composite_cpu::CpuCompositor::new(
            settings.clone(),
        ))),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::composite_wgpu::WgpuCompositor::new(
            settings.clone(),
        )?)),
        #[allow(unreachable_patterns)]
        _ => Err(PipelineError::context_unavailable(
            "requested backend is not available in this build",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_backend_is_always_available() {
        let backend = create_backend(BackendKind::Cpu, &RenderSettings::default()).unwrap();
        assert_eq!(backend.name(), "cpu");
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn gpu_without_feature_is_an_unavailable_context() {
        let err = create_backend(BackendKind::Gpu, &RenderSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::ContextUnavailable(_)));
    }

    #[test]
    fn backend_kind_uses_lowercase_names() {
        let kind: BackendKind = serde_json::from_str("\"gpu\"").unwrap();
        assert_eq!(kind, BackendKind::Gpu);
        assert_eq!(serde_json::to_string(&BackendKind::Cpu).unwrap(), "\"cpu\"");
    }
}
