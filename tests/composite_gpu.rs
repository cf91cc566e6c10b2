#[cfg(feature = "gpu")]
mod gpu {
    use sauna_mirage::{
        CompositeBackend, FrameUniforms, PipelineError, RasterView, RenderSettings, ShimmerParams,
        WgpuCompositor,
    };

    fn backend_or_skip(settings: RenderSettings) -> Option<WgpuCompositor> {
        match WgpuCompositor::new(settings) {
            Ok(b) => Some(b),
            Err(PipelineError::ContextUnavailable(msg)) => {
                eprintln!("skipping: {msg}");
                None
            }
            Err(e) => panic!("unexpected gpu init failure: {e}"),
        }
    }

    fn stripes(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _y in 0..height {
            for x in 0..width {
                data.extend_from_slice(if x % 8 < 4 {
                    &[255, 255, 255, 255]
                } else {
                    &[0, 0, 0, 0]
                });
            }
        }
        data
    }

    #[test]
    fn zero_intensity_matches_uploaded_texture() {
        let Some(mut backend) = backend_or_skip(RenderSettings::default()) else {
            return;
        };
        let (w, h) = (32, 16);
        let tex = stripes(w, h);
        backend.resize_target(w, h).unwrap();
        backend
            .upload_texture(RasterView {
                width: w,
                height: h,
                data: &tex,
            })
            .unwrap();
        backend
            .draw(&FrameUniforms {
                time: 4.0,
                intensity: 0.0,
                shimmer: ShimmerParams::default(),
            })
            .unwrap();

        let frame = backend.readback_rgba8().unwrap();
        assert_eq!((frame.width, frame.height), (w, h));
        let max_diff = frame
            .data
            .iter()
            .zip(&tex)
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0);
        assert!(max_diff <= 1, "max channel diff {max_diff}");
    }

    #[test]
    fn draw_without_upload_clears_to_the_clear_color() {
        let Some(mut backend) = backend_or_skip(RenderSettings {
            clear_rgba: Some([0, 0, 255, 255]),
        }) else {
            return;
        };
        backend.resize_target(8, 8).unwrap();
        backend
            .draw(&FrameUniforms {
                time: 0.0,
                intensity: 1.0,
                shimmer: ShimmerParams::default(),
            })
            .unwrap();
        let frame = backend.readback_rgba8().unwrap();
        assert!(frame.data.chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
    }

    #[test]
    fn translucent_clear_reads_back_premultiplied() {
        let Some(mut backend) = backend_or_skip(RenderSettings {
            clear_rgba: Some([255, 0, 0, 128]),
        }) else {
            return;
        };
        backend.resize_target(4, 4).unwrap();
        backend
            .draw(&FrameUniforms {
                time: 0.0,
                intensity: 0.0,
                shimmer: ShimmerParams::default(),
            })
            .unwrap();
        let frame = backend.readback_rgba8().unwrap();
        let expected = [128u8, 0, 0, 128];
        for px in frame.data.chunks_exact(4) {
            let diff = px.iter().zip(expected).map(|(a, b)| a.abs_diff(b)).max();
            assert!(diff <= Some(1), "pixel {px:?}");
        }
    }

    #[test]
    fn broken_shader_reports_compile_error() {
        let res = WgpuCompositor::with_shader_source(RenderSettings::default(), "fn vs( {");
        match res {
            Err(PipelineError::ContextUnavailable(_)) => {}
            Err(PipelineError::ShaderCompile(_)) => {}
            Err(other) => panic!("expected a shader compile error, got {other}"),
            Ok(_) => panic!("broken WGSL must not build a pipeline"),
        }
    }
}
