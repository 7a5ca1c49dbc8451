//! Presents a CPU-rendered canvas in a window by drawing it as a full-screen textured quad.

use std::rc::Rc;

use anyhow::Context;
use wgpu::*;
use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder},
};

use crate::image::{Image, Resolution};

use super::gpu::Gpu;

const BACKGROUND: Color = Color::BLACK;

/// Opens a fixed-size window.
pub fn open_window<T>(
    event_loop: &EventLoopWindowTarget<T>,
    title: &str,
    resolution: Resolution,
) -> anyhow::Result<Window> {
    let win = WindowBuilder::new()
        .with_resizable(false)
        .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
        .with_title(title)
        .build(event_loop)?;
    Ok(win)
}

struct Texture {
    inner: wgpu::Texture,
    size: Extent3d,
}

impl Texture {
    const FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

    fn create(gpu: &Gpu, size: Extent3d) -> Self {
        let inner = gpu.device().create_texture(&TextureDescriptor {
            label: Some("canvas"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self { inner, size }
    }

    /// Uploads RGBA8 `data`, reallocating the texture if `size` changed.
    ///
    /// Returns whether the texture was reallocated.
    fn upload(&mut self, gpu: &Gpu, size: Extent3d, data: &[u8]) -> bool {
        assert_eq!((size.width * size.height * 4) as usize, data.len());

        let reallocated = self.size != size;
        if reallocated {
            log::trace!(
                "reallocating canvas texture ({}x{} -> {}x{})",
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
            *self = Self::create(gpu, size);
        }

        gpu.queue().write_texture(
            ImageCopyTexture {
                texture: &self.inner,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: None,
            },
            size,
        );

        reallocated
    }
}

fn create_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let sampler = device.create_sampler(&SamplerDescriptor::default());
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("canvas_bind_group"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(
                    &texture.inner.create_view(&Default::default()),
                ),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

pub struct Renderer {
    gpu: Rc<Gpu>,
    resolution: Resolution,
    surface: Surface,
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    texture: Texture,

    /// Surface must be destroyed before the window.
    window: Window,
}

impl Renderer {
    pub fn new(window: Window, gpu: Rc<Gpu>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let resolution = Resolution::new(size.width, size.height);

        // SAFETY: the surface is stored next to the window and dropped before it.
        let surface = unsafe { gpu.instance().create_surface(&window)? };
        let surface_format = *surface
            .get_capabilities(gpu.adapter())
            .formats
            .first()
            .context("adapter cannot render to window surface")?;

        let shader = gpu.device().create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = gpu
            .device()
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: None,
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });

        let pipeline = gpu
            .device()
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("textured_quad"),
                layout: Some(&gpu.device().create_pipeline_layout(
                    &PipelineLayoutDescriptor {
                        label: None,
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    },
                )),
                vertex: VertexState {
                    module: &shader,
                    entry_point: "vert",
                    buffers: &[],
                },
                fragment: Some(FragmentState {
                    module: &shader,
                    entry_point: "frag",
                    targets: &[Some(ColorTargetState {
                        format: surface_format,
                        write_mask: ColorWrites::ALL,
                        blend: None,
                    })],
                }),
                primitive: PrimitiveState::default(),
                depth_stencil: None,
                multisample: Default::default(),
                multiview: None,
            });

        let texture = Texture::create(&gpu, Extent3d::default());
        let bind_group = create_bind_group(gpu.device(), &bind_group_layout, &texture);

        surface.configure(
            gpu.device(),
            &surface_config(surface_format, resolution),
        );
        log::debug!(
            "created target surface at {} (format: {:?})",
            resolution,
            surface_format,
        );

        Ok(Self {
            gpu,
            resolution,
            surface,
            pipeline,
            bind_group_layout,
            bind_group,
            texture,
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Returns the size of the render target, which is also the size canvases should have.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Replaces the displayed canvas.
    pub fn upload(&mut self, canvas: &Image) {
        let size = Extent3d {
            width: canvas.width(),
            height: canvas.height(),
            depth_or_array_layers: 1,
        };
        if self.texture.upload(&self.gpu, size, canvas.data()) {
            // The bind group refers to the old texture, so it has to be recreated.
            self.bind_group =
                create_bind_group(self.gpu.device(), &self.bind_group_layout, &self.texture);
        }
    }

    fn reconfigure(&mut self) {
        let format = self
            .surface
            .get_capabilities(self.gpu.adapter())
            .formats
            .first()
            .copied();
        match format {
            Some(format) => self
                .surface
                .configure(self.gpu.device(), &surface_config(format, self.resolution)),
            None => log::error!("adapter cannot render to window surface anymore"),
        }
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.reconfigure();
                self.surface
                    .get_current_texture()
                    .context("failed to acquire next frame after reconfiguring surface")?
            }
            Err(e) => return Err(anyhow::Error::new(e).context("failed to acquire frame")),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue().submit([encoder.finish()]);
        frame.present();
        Ok(())
    }
}

fn surface_config(format: TextureFormat, resolution: Resolution) -> SurfaceConfiguration {
    SurfaceConfiguration {
        usage: TextureUsages::RENDER_ATTACHMENT,
        format,
        width: resolution.width(),
        height: resolution.height(),
        present_mode: PresentMode::Fifo,
        alpha_mode: CompositeAlphaMode::Auto,
        view_formats: Vec::new(),
    }
}
