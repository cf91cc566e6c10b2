#![forbid(unsafe_code)]

pub mod color;
pub mod composite_cpu;
#[cfg(feature = "gpu")]
pub mod composite_wgpu;
pub mod compositor;
pub mod config;
pub mod dashboard;
pub mod effect;
pub mod error;
pub mod layout;
pub mod render;
pub mod schedule;
pub mod sparkline;
pub mod text_raster;

pub use color::{ColorRamp, Rgb8, Status, TemperatureRange, ThemePalettes, ThemeState};
pub use composite_cpu::CpuCompositor;
#[cfg(feature = "gpu")]
pub use composite_wgpu::WgpuCompositor;
pub use compositor::{ActivePipeline, AnimationClock, Compositor};
pub use config::PipelineConfig;
pub use dashboard::{Dashboard, DashboardView, Metric, Reading, SeriesPoint};
pub use effect::{FrameUniforms, ShimmerParams, intensity_for_status};
pub use error::{DisableReason, PipelineError, PipelineResult};
pub use layout::{LayoutMeasurer, LayoutSnapshot, NoLayout, PixelSize, SurfaceObservation, TextAnchor};
pub use render::{BackendKind, CompositeBackend, FrameRGBA, RasterView, RenderSettings, create_backend};
pub use schedule::{FixedRateScheduler, FrameControl, FrameScheduler, run};
pub use sparkline::{SparklineConfig, SparklineGeometry};
pub use text_raster::{TextPlan, TextRaster, TextStyle};
