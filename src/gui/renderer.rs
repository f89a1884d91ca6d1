//! wgpu renderer that draws one RGBA texture stretched over a whole window.

use anyhow::{anyhow, Context};
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

const BACKGROUND: Color = Color::BLACK;

/// GPU handles shared by everything the renderer creates.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    /// Opens a suitable default GPU.
    pub async fn open() -> anyhow::Result<Self> {
        // The OpenGL backend panics spuriously, so don't enable it.
        let backends = Backends::PRIMARY;
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        log::debug!("available graphics adapters:");
        for adapter in instance.enumerate_adapters(backends) {
            log_adapter("-", &adapter.get_info());
        }

        let adapter = instance
            .request_adapter(&Default::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        log_adapter("using", &adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    // Webcam frames can exceed the downlevel texture size limit.
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .context("failed to open graphics device")?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

fn log_adapter(prefix: &str, info: &AdapterInfo) {
    let backend = match info.backend {
        Backend::Empty => "dummy",
        Backend::Vulkan => "Vulkan",
        Backend::Metal => "Metal",
        Backend::Dx12 => "DX12",
        Backend::Dx11 => "DX11",
        Backend::Gl => "OpenGL",
        Backend::BrowserWebGpu => "WebGPU",
    };
    let device_type = match info.device_type {
        DeviceType::Other => "Unknown",
        DeviceType::IntegratedGpu => "iGPU",
        DeviceType::DiscreteGpu => "dGPU",
        DeviceType::VirtualGpu => "vGPU",
        DeviceType::Cpu => "CPU",
    };
    log::info!("{prefix} {} ({device_type}, {backend})", info.name);
}

/// Opens a non-resizable native window with an inner size of `resolution`.
pub fn open_window<T>(
    event_loop: &EventLoopWindowTarget<T>,
    title: &str,
    resolution: Resolution,
) -> anyhow::Result<winit::window::Window> {
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

    fn create(device: &Device, size: Extent3d) -> Self {
        Self {
            inner: device.create_texture(&TextureDescriptor {
                label: Some("frame"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: Self::FORMAT,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            }),
            size,
        }
    }

    /// Uploads `data`, reallocating the texture if `size` changed.
    ///
    /// Returns whether the texture was reallocated.
    fn update(&mut self, gpu: &Gpu, size: Extent3d, data: &[u8]) -> anyhow::Result<bool> {
        let expected = size.width as usize * size.height as usize * 4;
        anyhow::ensure!(
            data.len() == expected,
            "frame data has {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            size.width,
            size.height,
        );

        let mut reallocated = false;
        if self.size != size {
            log::trace!(
                "reallocating frame texture ({}x{} -> {}x{})",
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
            *self = Self::create(&gpu.device, size);
            reallocated = true;
        }

        gpu.queue.write_texture(
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

        Ok(reallocated)
    }
}

fn create_bind_group(device: &Device, layout: &BindGroupLayout, texture: &Texture) -> BindGroup {
    let sampler = device.create_sampler(&SamplerDescriptor::default());
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("frame_bind_group"),
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
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    texture: Texture,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    resolution: Resolution,
    gpu: Gpu,

    /// Surface must be destroyed before the window.
    window: winit::window::Window,
}

impl Renderer {
    pub fn new(window: winit::window::Window, gpu: Gpu) -> anyhow::Result<Self> {
        // SAFETY: `window` is owned by the renderer and outlives `surface` (field order).
        let surface = unsafe { gpu.instance.create_surface(&window)? };
        let surface_format = *surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .context("graphics adapter cannot render to the window surface")?;

        let shader = gpu.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = gpu
            .device
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
            .device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("textured_quad"),
                layout: Some(
                    &gpu.device
                        .create_pipeline_layout(&PipelineLayoutDescriptor {
                            label: None,
                            bind_group_layouts: &[&bind_group_layout],
                            push_constant_ranges: &[],
                        }),
                ),
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

        let size = window.inner_size();
        let resolution = Resolution::new(size.width, size.height);
        let texture = Texture::create(&gpu.device, Extent3d::default());
        let bind_group = create_bind_group(&gpu.device, &bind_group_layout, &texture);

        let this = Self {
            gpu,
            surface,
            surface_format,
            pipeline,
            texture,
            bind_group_layout,
            bind_group,
            resolution,
            window,
        };
        this.recreate_swapchain();
        Ok(this)
    }

    /// Uploads a new RGBA8 frame of resolution `res`.
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) -> anyhow::Result<()> {
        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.texture.update(&self.gpu, size, data)? {
            // The bind group references the old texture.
            self.bind_group =
                create_bind_group(&self.gpu.device, &self.bind_group_layout, &self.texture);
        }
        Ok(())
    }

    /// Draws the current texture to the window and presents it.
    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.recreate_swapchain();
                self.surface
                    .get_current_texture()
                    .context("failed to acquire next frame after recreating swapchain")?
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("timed out acquiring a frame, skipping redraw");
                return Ok(());
            }
            Err(e) => return Err(e).context("failed to acquire frame"),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let color_attachment = RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(BACKGROUND),
                    store: true,
                },
            };
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(color_attachment)],
                depth_stencil_attachment: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }

    fn recreate_swapchain(&self) {
        let size = self.window.inner_size();
        log::debug!(
            "creating target surface at {}x{} (format: {:?})",
            size.width,
            size.height,
            self.surface_format,
        );
        if size.width != self.resolution.width() || size.height != self.resolution.height() {
            // The window is not resizable, but window managers don't always agree.
            log::warn!(
                "window dimensions {}x{} do not match configured output resolution {}",
                size.width,
                size.height,
                self.resolution,
            );
        }
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width: self.resolution.width(),
            height: self.resolution.height(),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: Vec::new(),
        };

        self.surface.configure(&self.gpu.device, &config);
    }
}
