use wgpu::util::DeviceExt as _;

use crate::{
    composite_cpu::premul_rgba8,
    effect::{FrameUniforms, SHIMMER_WGSL},
    error::{PipelineError, PipelineResult},
    render::{CompositeBackend, FrameRGBA, RasterView, RenderSettings},
};

/// Full-viewport quad as two triangles in clip space.
const QUAD_POSITIONS: [f32; 12] = [
    -1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    -1.0, 1.0, //
    1.0, -1.0, //
    1.0, 1.0,
];

/// V runs opposite to clip-space Y so raster row 0 lands at the top of the quad.
const QUAD_TEX_COORDS: [f32; 12] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    0.0, 0.0, //
    1.0, 1.0, //
    1.0, 0.0,
];

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct GpuTexture {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct TextTexture {
    surface: GpuTexture,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuCompositor {
    settings: RenderSettings,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params: wgpu::Buffer,
    positions: wgpu::Buffer,
    tex_coords: wgpu::Buffer,
    text: Option<TextTexture>,
    target: Option<GpuTexture>,
}

impl WgpuCompositor {
    pub fn new(settings: RenderSettings) -> PipelineResult<Self> {
        Self::with_shader_source(settings, SHIMMER_WGSL)
    }

    /// Build against an arbitrary WGSL program exposing `vs`/`fs` with the
    /// standard bindings.
    pub fn with_shader_source(settings: RenderSettings, source: &str) -> PipelineResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                PipelineError::context_unavailable("no gpu adapter available")
            }
            other => PipelineError::context_unavailable(format!(
                "wgpu request_adapter failed: {other:?}"
            )),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("mirage_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                .using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| PipelineError::context_unavailable(format!("wgpu request_device failed: {e:?}")))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mirage_shimmer_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(PipelineError::shader_compile(err.to_string()));
        }

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("mirage_text_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mirage_params"),
            size: FrameUniforms::SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mirage_quad_positions"),
            contents: &f32_bytes(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mirage_quad_tex_coords"),
            contents: &f32_bytes(&QUAD_TEX_COORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mirage_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(FrameUniforms::SIZE as u64),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mirage_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 0,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 1,
                }],
            },
        ];

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mirage_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &vertex_buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(PipelineError::program_link(err.to_string()));
        }

        tracing::debug!(adapter = ?adapter.get_info().name, "wgpu compositor ready");

        Ok(Self {
            settings,
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            params,
            positions,
            tex_coords,
            text: None,
            target: None,
        })
    }

    fn create_texture(
        &self,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            width,
            height,
            texture,
            view,
        }
    }

    fn ensure_text_texture(&mut self, width: u32, height: u32) {
        let stale = self
            .text
            .as_ref()
            .map(|t| t.surface.width != width || t.surface.height != height)
            .unwrap_or(true);
        if stale {
            let surface = self.create_texture(
                "mirage_text_texture",
                width,
                height,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            );
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mirage_bg"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&surface.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params.as_entire_binding(),
                    },
                ],
            });
            self.text = Some(TextTexture {
                surface,
                bind_group,
            });
        }
    }
}

impl CompositeBackend for WgpuCompositor {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn resize_target(&mut self, width: u32, height: u32) -> PipelineResult<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(PipelineError::raster(format!(
                "render target {width}x{height} exceeds max texture dimension {max}"
            )));
        }
        self.target = Some(self.create_texture(
            "mirage_target",
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        ));
        Ok(())
    }

    fn upload_texture(&mut self, raster: RasterView<'_>) -> PipelineResult<()> {
        if raster.width == 0 || raster.height == 0 {
            return Ok(());
        }
        if raster.data.len() != raster.width as usize * raster.height as usize * 4 {
            return Err(PipelineError::raster(
                "texture upload byte length mismatch",
            ));
        }
        self.ensure_text_texture(raster.width, raster.height);
        let text = self
            .text
            .as_ref()
            .ok_or_else(|| PipelineError::raster("text texture not allocated"))?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &text.surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            raster.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(raster.width * 4),
                rows_per_image: Some(raster.height),
            },
            wgpu::Extent3d {
                width: raster.width,
                height: raster.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw(&mut self, uniforms: &FrameUniforms) -> PipelineResult<()> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| PipelineError::raster("render target not allocated"))?;

        self.queue.write_buffer(&self.params, 0, &uniforms.to_bytes());

        let clear = clear_color(self.settings.clear_rgba);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mirage_frame_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mirage_frame_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(text) = &self.text {
                rp.set_pipeline(&self.pipeline);
                rp.set_bind_group(0, &text.bind_group, &[]);
                rp.set_vertex_buffer(0, self.positions.slice(..));
                rp.set_vertex_buffer(1, self.tex_coords.slice(..));
                rp.draw(0..6, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn readback_rgba8(&mut self) -> PipelineResult<FrameRGBA> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| PipelineError::raster("render target not allocated"))?;
        let (width, height) = (target.width, target.height);

        let bytes_per_row_unpadded = width
            .checked_mul(4)
            .ok_or_else(|| PipelineError::raster("render target width overflow"))?;
        let bytes_per_row = align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = (bytes_per_row as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| PipelineError::raster("readback buffer size overflow"))?;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mirage_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mirage_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| PipelineError::raster(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| PipelineError::raster("readback channel closed"))?
            .map_err(|e| PipelineError::raster(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = width as usize * 4;
        let padded_row_bytes = bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();

        Ok(FrameRGBA {
            width,
            height,
            data: out,
            premultiplied: true,
        })
    }
}

/// The target holds premultiplied color, so the clear value is premultiplied
/// the same way the CPU compositor does it.
fn clear_color(clear_rgba: Option<[u8; 4]>) -> wgpu::Color {
    let Some([r, g, b, a]) = clear_rgba else {
        return wgpu::Color::TRANSPARENT;
    };
    let [r, g, b, a] = premul_rgba8(r, g, b, a).map(|c| f64::from(c) / 255.0);
    wgpu::Color { r, g, b, a }
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_uv_puts_raster_top_at_clip_top() {
        for (pos, uv) in QUAD_POSITIONS.chunks_exact(2).zip(QUAD_TEX_COORDS.chunks_exact(2)) {
            assert_eq!(uv[0], (pos[0] + 1.0) * 0.5);
            assert_eq!(uv[1], (1.0 - pos[1]) * 0.5);
        }
    }

    #[test]
    fn translucent_clear_color_is_premultiplied() {
        let c = clear_color(Some([255, 0, 0, 128]));
        assert_eq!(c.r, 128.0 / 255.0);
        assert_eq!(c.g, 0.0);
        assert_eq!(c.a, 128.0 / 255.0);

        let opaque = clear_color(Some([0, 0, 255, 255]));
        assert_eq!((opaque.b, opaque.a), (1.0, 1.0));
        assert_eq!(clear_color(None), wgpu::Color::TRANSPARENT);
    }

    #[test]
    fn align_to_rounds_up_to_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(1028, 256), 1280);
    }
}
