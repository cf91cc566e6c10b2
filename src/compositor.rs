//! The live overlay: text raster, GPU texture and frame pacing kept in step.
//!
//! All state is touched from the host's single UI thread. The texture is the
//! only producer/consumer hand-off: text, layout and theme changes repaint the
//! raster and set the dirty flag; the next [`Compositor::frame`] uploads the
//! raster once and then draws, so a draw never reads a stale texture.

use std::time::{Duration, Instant};

use crate::{
    color::ThemeState,
    config::PipelineConfig,
    effect::{FrameUniforms, ShimmerParams, intensity_for_status},
    error::{DisableReason, PipelineResult},
    layout::{LayoutMeasurer, PixelSize, SurfaceObservation},
    render::{CompositeBackend, FrameRGBA, create_backend},
    schedule::FrameControl,
    text_raster::TextRaster,
};

/// Elapsed wall-clock time since the pipeline started.
#[derive(Clone, Copy, Debug)]
pub struct AnimationClock {
    start: Instant,
}

impl AnimationClock {
    pub fn starting_at(start: Instant) -> Self {
        Self { start }
    }

    /// Never negative, even for an instant before the start.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }
}

/// Everything a working compositor owns.
pub struct ActivePipeline {
    backend: Box<dyn CompositeBackend>,
    raster: TextRaster,
    measurer: Box<dyn LayoutMeasurer>,
    clock: AnimationClock,
    shimmer: ShimmerParams,
    dirty: bool,
    target: PixelSize,
    device_pixel_ratio: f64,
    mounted: bool,
    frames: u64,
    uploads: u64,
}

impl ActivePipeline {
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn raster(&self) -> &TextRaster {
        &self.raster
    }

    /// True while the raster holds changes the GPU texture has not seen.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn target_size(&self) -> PixelSize {
        self.target
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn intensity(&self) -> f32 {
        intensity_for_status(self.raster.status())
    }

    pub fn readback_rgba8(&mut self) -> PipelineResult<FrameRGBA> {
        self.backend.readback_rgba8()
    }

    fn apply_observation(&mut self, observation: SurfaceObservation) -> PipelineResult<()> {
        let size = observation.pixel_size();
        let dpr = observation.device_pixel_ratio();
        // Reflow can move the placeholders without changing the surface size.
        let layout = self.measurer.measure_layout();

        self.device_pixel_ratio = dpr;
        self.raster.set_device_pixel_ratio(dpr);

        if size != self.target {
            tracing::debug!(
                width = size.width,
                height = size.height,
                dpr,
                "surface resized; reallocating raster"
            );
            if !size.is_empty() {
                self.backend.resize_target(size.width, size.height)?;
            }
            self.target = size;
            self.raster.replace_layout(layout);
            self.raster.resize(size.width, size.height);
        } else {
            tracing::trace!("surface size unchanged; redrawing with fresh layout");
            self.raster.replace_layout(layout);
            self.raster.draw();
        }
        self.dirty = true;
        Ok(())
    }

    fn render_frame(&mut self, now: Instant) -> PipelineResult<()> {
        if self.target.is_empty() {
            return Ok(());
        }
        let time = self.clock.elapsed(now).as_secs_f32();

        if self.dirty {
            self.backend.upload_texture(self.raster.view())?;
            self.dirty = false;
            self.uploads += 1;
            tracing::trace!(uploads = self.uploads, "text texture uploaded");
        }

        let uniforms = FrameUniforms {
            time,
            intensity: self.intensity(),
            shimmer: self.shimmer,
        };
        self.backend.draw(&uniforms)?;
        self.frames += 1;
        Ok(())
    }
}

/// Tagged outcome of initialization. Every public call branches on the tag and
/// does nothing once the compositor is disabled.
pub enum Compositor {
    Ready(Box<ActivePipeline>),
    Disabled(DisableReason),
}

impl Compositor {
    /// Acquire the configured backend and build the pipeline around it.
    pub fn new(config: &PipelineConfig, measurer: Box<dyn LayoutMeasurer>) -> Self {
        let backend = create_backend(config.backend, &config.render_settings());
        Self::with_backend(config, backend, measurer)
    }

    /// Build around an already-attempted backend acquisition. An invalid config or
    /// a failed acquisition becomes [`Compositor::Disabled`].
    pub fn with_backend(
        config: &PipelineConfig,
        backend: PipelineResult<Box<dyn CompositeBackend>>,
        measurer: Box<dyn LayoutMeasurer>,
    ) -> Self {
        let backend = match config.validate().and(backend) {
            Ok(backend) => backend,
            Err(err) => {
                let reason = DisableReason::from(err);
                tracing::warn!(%reason, "compositor disabled at startup");
                return Self::Disabled(reason);
            }
        };
        tracing::info!(backend = backend.name(), "compositor ready");

        let mut raster = TextRaster::from_style(config.text.clone());
        raster.set_status_color(config.theme.theme_for(config.theme.range.low).text);

        Self::Ready(Box::new(ActivePipeline {
            backend,
            raster,
            measurer,
            clock: AnimationClock::starting_at(Instant::now()),
            shimmer: config.effect,
            dirty: false,
            target: PixelSize::default(),
            device_pixel_ratio: 1.0,
            mounted: false,
            frames: 0,
            uploads: 0,
        }))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn disable_reason(&self) -> Option<&DisableReason> {
        match self {
            Self::Ready(_) => None,
            Self::Disabled(reason) => Some(reason),
        }
    }

    pub fn pipeline(&self) -> Option<&ActivePipeline> {
        match self {
            Self::Ready(p) => Some(p.as_ref()),
            Self::Disabled(_) => None,
        }
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut ActivePipeline> {
        match self {
            Self::Ready(p) => Some(p.as_mut()),
            Self::Disabled(_) => None,
        }
    }

    /// Attach to a hosting surface; frames start drawing from here on.
    pub fn mount(&mut self, observation: SurfaceObservation) {
        let Some(p) = self.pipeline_mut() else {
            return;
        };
        if !p.mounted {
            p.mounted = true;
            p.clock = AnimationClock::starting_at(Instant::now());
            tracing::debug!("compositor mounted");
        }
        self.observe_resize(observation);
    }

    /// React to a size change of the surface or its container. Redundant
    /// observations are processed in full.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn observe_resize(&mut self, observation: SurfaceObservation) {
        let result = match self.pipeline_mut() {
            Some(p) => p.apply_observation(observation),
            None => return,
        };
        self.absorb(result);
    }

    /// Replace the status word and the reading. Re-measures layout first because
    /// new text changes the host's flow.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn set_text(&mut self, status: &str, value: &str) {
        let Some(p) = self.pipeline_mut() else {
            return;
        };
        let layout = p.measurer.measure_layout();
        p.raster
            .update(status.to_string(), value.to_string(), layout);
        p.dirty = true;
    }

    /// Follow the live theme: the status line takes the theme's text color.
    pub fn set_theme(&mut self, theme: &ThemeState) {
        let Some(p) = self.pipeline_mut() else {
            return;
        };
        p.raster.set_status_color(theme.text);
        p.dirty = true;
    }

    /// One animation-loop iteration at `now`: upload the raster if it changed,
    /// then draw once.
    pub fn frame(&mut self, now: Instant) -> FrameControl {
        let result = match self.pipeline_mut() {
            Some(p) if !p.mounted => return FrameControl::Continue,
            Some(p) => p.render_frame(now),
            None => return FrameControl::Stop,
        };
        self.absorb(result);
        if self.is_ready() {
            FrameControl::Continue
        } else {
            FrameControl::Stop
        }
    }

    /// Release GPU resources and stop the loop. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if let Self::Ready(p) = self {
            tracing::info!(frames = p.frames, "compositor disposed");
        }
        *self = Self::Disabled(DisableReason::Disposed);
    }

    fn absorb(&mut self, result: PipelineResult<()>) {
        if let Err(err) = result {
            let reason = DisableReason::from(err);
            tracing::warn!(%reason, "compositor disabled");
            *self = Self::Disabled(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::PipelineError, layout::NoLayout};

    fn cpu() -> Compositor {
        Compositor::new(&PipelineConfig::default(), Box::new(NoLayout))
    }

    #[test]
    fn clock_saturates_before_start() {
        let start = Instant::now();
        let clock = AnimationClock::starting_at(start + Duration::from_secs(5));
        assert_eq!(clock.elapsed(start), Duration::ZERO);
        let clock = AnimationClock::starting_at(start);
        assert_eq!(
            clock.elapsed(start + Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn failed_acquisition_disables_without_panicking() {
        let mut c = Compositor::with_backend(
            &PipelineConfig::default(),
            Err(PipelineError::context_unavailable("no adapter")),
            Box::new(NoLayout),
        );
        assert_eq!(
            c.disable_reason(),
            Some(&DisableReason::ContextUnavailable("no adapter".to_string()))
        );
        c.set_text("Yes!", "140°F");
        c.mount(SurfaceObservation::new(320.0, 200.0, 1.0));
        c.set_theme(&ThemeState::default());
        assert_eq!(c.frame(Instant::now()), FrameControl::Stop);
    }

    #[test]
    fn invalid_config_disables_instead_of_drawing_nan_colors() {
        let mut config = PipelineConfig::default();
        config.theme.range.high = config.theme.range.low;
        let mut c = Compositor::new(&config, Box::new(NoLayout));
        assert!(matches!(
            c.disable_reason(),
            Some(DisableReason::InvalidConfig(msg)) if msg.contains("low < high")
        ));
        c.set_theme(&ThemeState::default());
        assert_eq!(c.frame(Instant::now()), FrameControl::Stop);
    }

    #[test]
    fn unmounted_frames_draw_nothing() {
        let mut c = cpu();
        c.set_text("Nope", "71°F");
        assert_eq!(c.frame(Instant::now()), FrameControl::Continue);
        let p = c.pipeline().unwrap();
        assert_eq!(p.frames_drawn(), 0);
        assert!(p.is_dirty());
    }

    #[test]
    fn zero_sized_surface_skips_drawing() {
        let mut c = cpu();
        c.mount(SurfaceObservation::new(0.0, 0.0, 2.0));
        assert_eq!(c.frame(Instant::now()), FrameControl::Continue);
        assert_eq!(c.pipeline().unwrap().frames_drawn(), 0);
    }

    #[test]
    fn dispose_stops_the_loop() {
        let mut c = cpu();
        c.mount(SurfaceObservation::new(64.0, 32.0, 1.0));
        assert_eq!(c.frame(Instant::now()), FrameControl::Continue);
        c.dispose();
        assert_eq!(c.disable_reason(), Some(&DisableReason::Disposed));
        assert_eq!(c.frame(Instant::now()), FrameControl::Stop);
        c.set_text("Yes!", "");
    }
}
