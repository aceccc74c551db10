use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use winit::window::{Fullscreen, Window};

use crate::coords::{Color, Viewport};
use crate::pipeline::{ResolvedElement, ShaderBlob, ShaderStage};

use super::backend::{
    Backend, BufferDesc, BufferUsage, DeviceHandles, PresentOutcome, ResourceId, ResourceKind,
    SwapChainDesc,
};
use super::config::DeviceConfig;
use super::context::{ImmediateContext, PipelineKey, VertexBinding};
use super::error::{
    DeviceCreationError, DeviceLostError, PresentError, ResourceCreationError, SurfaceErrorAction,
};
use super::resources::ResourceTable;
use super::surface;

enum GpuObject {
    /// Marker; the real objects live in [`Core`].
    Device,
    Context,
    /// Marker; the real objects live in [`SwapChain`].
    SwapChain,
    BackBuffer,
    RenderTargetView(wgpu::TextureView),
    Shader {
        module: wgpu::ShaderModule,
        entry_point: String,
    },
    InputLayout(Vec<ResolvedElement>),
    Buffer {
        buffer: wgpu::Buffer,
        /// CPU side of `map_discard`, uploaded on `unmap`.
        staging: Vec<u8>,
        usage: BufferUsage,
        mapped: bool,
    },
}

struct Core {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

struct SwapChain<'w> {
    /// Surface lifetime is tied to the window via `'w`.
    surface: wgpu::Surface<'w>,
    config: wgpu::SurfaceConfiguration,
    back_buffer: wgpu::Texture,
    desc: SwapChainDesc,
}

/// [`Backend`] on top of wgpu.
///
/// wgpu has no immediate context, so bound state is collected and turned into
/// a render pass per draw. Draws target an offscreen back buffer which is
/// resolved (or copied) into the surface image on present. Render pipelines
/// are built on first use for each shader/layout/topology combination.
pub struct WgpuBackend<'w> {
    /// wgpu instance used to create the adapter and surface.
    instance: wgpu::Instance,
    window: Option<&'w Window>,
    core: Option<Core>,
    swap_chain: Option<SwapChain<'w>>,
    context: ImmediateContext,
    objects: ResourceTable<GpuObject>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    /// Set from the device-lost callback.
    lost: Arc<Mutex<Option<String>>>,
}

impl Default for WgpuBackend<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'w> WgpuBackend<'w> {
    pub fn new() -> Self {
        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        Self {
            instance,
            window: None,
            core: None,
            swap_chain: None,
            context: ImmediateContext::default(),
            objects: ResourceTable::new(),
            pipelines: HashMap::new(),
            lost: Arc::new(Mutex::new(None)),
        }
    }

    fn take_lost(&self) -> Option<String> {
        self.lost.lock().ok().and_then(|mut slot| slot.take())
    }

    fn device(&self) -> Option<&wgpu::Device> {
        self.core.as_ref().map(|core| &core.device)
    }

    fn is_context(&self, context: ResourceId) -> bool {
        matches!(self.objects.get(context), Some(GpuObject::Context))
    }

    fn create_shader(
        &mut self,
        blob: &ShaderBlob,
        stage: ShaderStage,
        kind: ResourceKind,
    ) -> Result<ResourceId, ResourceCreationError> {
        let fail = |reason: &str| ResourceCreationError::ShaderStage {
            stage,
            reason: reason.to_owned(),
        };
        if blob.stage() != stage {
            return Err(fail("blob was compiled for another stage"));
        }
        let device = self.device().ok_or_else(|| fail("no live device"))?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(blob.entry_point()),
            source: wgpu::ShaderSource::Wgsl(blob.code().into()),
        });
        Ok(self.objects.insert(
            kind,
            GpuObject::Shader {
                module,
                entry_point: blob.entry_point().to_owned(),
            },
        ))
    }

    /// Clears the back buffer if a clear is still pending.
    fn flush_clear(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some((view, color)) = self.context.pending_clear.take() else {
            return;
        };
        let Some(GpuObject::RenderTargetView(target)) = self.objects.get(view) else {
            return;
        };
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tin clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    desc: &SwapChainDesc,
    objects: &ResourceTable<GpuObject>,
    key: PipelineKey,
) -> Option<wgpu::RenderPipeline> {
    let Some(GpuObject::Shader {
        module: vs_module,
        entry_point: vs_entry,
    }) = objects.get(key.vertex_shader)
    else {
        return None;
    };
    let Some(GpuObject::Shader {
        module: ps_module,
        entry_point: ps_entry,
    }) = objects.get(key.pixel_shader)
    else {
        return None;
    };
    let Some(GpuObject::InputLayout(elements)) = objects.get(key.input_layout) else {
        return None;
    };

    let attributes: Vec<wgpu::VertexAttribute> = elements
        .iter()
        .map(|e| wgpu::VertexAttribute {
            format: e.format,
            offset: u64::from(e.offset),
            shader_location: e.shader_location,
        })
        .collect();
    let step_mode = elements
        .first()
        .map_or(wgpu::VertexStepMode::Vertex, |e| e.step_mode);

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("tin pipeline layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    });

    log::debug!(
        "building render pipeline {} + {} ({:?}, stride {})",
        key.vertex_shader,
        key.pixel_shader,
        key.topology,
        key.stride
    );

    Some(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tin pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: vs_module,
            entry_point: Some(vs_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: u64::from(key.stride),
                step_mode,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: ps_module,
            entry_point: Some(ps_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        // clockwise front faces, back faces culled
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Cw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: desc.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    }))
}

impl<'w> Backend for WgpuBackend<'w> {
    type Window = &'w Window;

    fn create_device(
        &mut self,
        window: &'w Window,
        config: &DeviceConfig,
    ) -> Result<DeviceHandles, DeviceCreationError> {
        if self.core.is_some() {
            return Err(DeviceCreationError::Device(
                "a device already exists on this backend".into(),
            ));
        }

        let surface = self
            .instance
            .create_surface(window)
            .map_err(|e| DeviceCreationError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(self.instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| DeviceCreationError::NoAdapter(e.to_string()))?;

        let info = adapter.get_info();
        if info.device_type == wgpu::DeviceType::Cpu {
            return Err(DeviceCreationError::NoAdapter(format!(
                "only the software adapter `{}` is available",
                info.name
            )));
        }

        // needed for sample counts beyond the guaranteed 1 and 4
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("tin-engine device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceCreationError::Device(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps.formats)
            .ok_or_else(|| DeviceCreationError::SwapChain("surface reports no formats".into()))?;

        if !surface::sample_count_supported(
            format,
            device.features(),
            adapter.get_texture_format_features(format),
            config.sample_count,
        ) {
            return Err(DeviceCreationError::UnsupportedSampleCount {
                requested: config.sample_count,
                format,
            });
        }

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if config.sample_count == 1 {
            if !caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
                return Err(DeviceCreationError::SwapChain(
                    "surface images can not be copied into".into(),
                ));
            }
            usage |= wgpu::TextureUsages::COPY_DST;
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width: config.width,
            height: config.height,
            present_mode: surface::present_mode_for(0),
            alpha_mode: surface::choose_alpha_mode(&caps),
            view_formats: vec![],
            desired_maximum_frame_latency: config.desired_maximum_frame_latency,
        };
        surface.configure(&device, &surface_config);

        let back_buffer = surface::create_back_buffer(
            &device,
            format,
            config.width,
            config.height,
            config.sample_count,
        );

        let lost = Arc::clone(&self.lost);
        device.set_device_lost_callback(move |reason, message| {
            if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                return;
            }
            log::error!("wgpu device lost ({reason:?}): {message}");
            if let Ok(mut slot) = lost.lock() {
                *slot = Some(message);
            }
        });
        self.take_lost();

        if !config.windowed {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        log::info!(
            "wgpu adapter: {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let desc = SwapChainDesc::from_config(config, format);
        self.window = Some(window);
        self.core = Some(Core {
            adapter,
            device,
            queue,
        });
        self.swap_chain = Some(SwapChain {
            surface,
            config: surface_config,
            back_buffer,
            desc,
        });

        Ok(DeviceHandles {
            device: self.objects.insert(ResourceKind::Device, GpuObject::Device),
            context: self.objects.insert(ResourceKind::Context, GpuObject::Context),
            swap_chain: self
                .objects
                .insert(ResourceKind::SwapChain, GpuObject::SwapChain),
        })
    }

    fn swap_chain_desc(&self, swap_chain: ResourceId) -> Option<SwapChainDesc> {
        match self.objects.get(swap_chain) {
            Some(GpuObject::SwapChain) => self.swap_chain.as_ref().map(|sc| sc.desc),
            _ => None,
        }
    }

    fn set_fullscreen_state(&mut self, swap_chain: ResourceId, fullscreen: bool) {
        if !matches!(self.objects.get(swap_chain), Some(GpuObject::SwapChain)) {
            return;
        }
        if let Some(window) = self.window {
            window.set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
        }
        if let Some(sc) = self.swap_chain.as_mut() {
            sc.desc.windowed = !fullscreen;
        }
    }

    fn resize_buffers(
        &mut self,
        swap_chain: ResourceId,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceCreationError> {
        if !matches!(self.objects.get(swap_chain), Some(GpuObject::SwapChain)) {
            return Err(ResourceCreationError::InvalidHandle(swap_chain));
        }
        let views = self.objects.count_of(ResourceKind::RenderTargetView)
            + self.objects.count_of(ResourceKind::BackBuffer);
        if views > 0 {
            return Err(ResourceCreationError::ResizeBuffers(format!(
                "{views} references to the back buffer are still alive"
            )));
        }
        let (Some(core), Some(sc)) = (self.core.as_ref(), self.swap_chain.as_mut()) else {
            return Err(ResourceCreationError::ResizeBuffers("no live device".into()));
        };

        sc.config.width = width;
        sc.config.height = height;
        sc.surface.configure(&core.device, &sc.config);
        sc.back_buffer = surface::create_back_buffer(
            &core.device,
            sc.config.format,
            width,
            height,
            sc.desc.sample_count,
        );
        sc.desc.width = width;
        sc.desc.height = height;
        Ok(())
    }

    fn back_buffer(
        &mut self,
        swap_chain: ResourceId,
        index: u32,
    ) -> Result<ResourceId, ResourceCreationError> {
        let Some(desc) = self.swap_chain_desc(swap_chain) else {
            return Err(ResourceCreationError::InvalidHandle(swap_chain));
        };
        if index >= desc.buffer_count {
            return Err(ResourceCreationError::BackBuffer {
                index,
                reason: format!("swap chain has {} back buffers", desc.buffer_count),
            });
        }
        Ok(self
            .objects
            .insert(ResourceKind::BackBuffer, GpuObject::BackBuffer))
    }

    fn create_render_target_view(
        &mut self,
        texture: ResourceId,
    ) -> Result<ResourceId, ResourceCreationError> {
        if !matches!(self.objects.get(texture), Some(GpuObject::BackBuffer)) {
            return Err(ResourceCreationError::InvalidHandle(texture));
        }
        let Some(sc) = self.swap_chain.as_ref() else {
            return Err(ResourceCreationError::RenderTargetView(
                "swap chain is gone".into(),
            ));
        };
        let view = sc
            .back_buffer
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.objects.insert(
            ResourceKind::RenderTargetView,
            GpuObject::RenderTargetView(view),
        ))
    }

    fn create_vertex_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError> {
        self.create_shader(blob, ShaderStage::Vertex, ResourceKind::VertexShader)
    }

    fn create_pixel_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError> {
        self.create_shader(blob, ShaderStage::Pixel, ResourceKind::PixelShader)
    }

    fn create_input_layout(
        &mut self,
        elements: &[ResolvedElement],
        _vertex_shader: &ShaderBlob,
    ) -> Result<ResourceId, ResourceCreationError> {
        if self.core.is_none() {
            return Err(ResourceCreationError::InputLayout("no live device".into()));
        }
        if elements.is_empty() {
            return Err(ResourceCreationError::InputLayout("no elements".into()));
        }
        Ok(self.objects.insert(
            ResourceKind::InputLayout,
            GpuObject::InputLayout(elements.to_vec()),
        ))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ResourceId, ResourceCreationError> {
        let Some(device) = self.device() else {
            return Err(ResourceCreationError::Buffer("no live device".into()));
        };
        if desc.byte_width == 0 {
            return Err(ResourceCreationError::Buffer(format!("`{}` is empty", desc.label)));
        }
        // queue writes must be a multiple of the copy alignment
        let size = desc.byte_width.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let Ok(staging_len) = usize::try_from(size) else {
            return Err(ResourceCreationError::Buffer(format!("{size} bytes is too large")));
        };
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(self.objects.insert(
            ResourceKind::Buffer,
            GpuObject::Buffer {
                buffer,
                staging: vec![0; staging_len],
                usage: desc.usage,
                mapped: false,
            },
        ))
    }

    fn map_discard(
        &mut self,
        context: ResourceId,
        buffer: ResourceId,
    ) -> Result<&mut [u8], ResourceCreationError> {
        if !self.is_context(context) {
            return Err(ResourceCreationError::InvalidHandle(context));
        }
        let map_error = |reason: &str| ResourceCreationError::Map {
            id: buffer,
            reason: reason.to_owned(),
        };
        match self.objects.get_mut(buffer) {
            Some(GpuObject::Buffer {
                staging,
                usage: BufferUsage::DynamicWrite,
                mapped,
                ..
            }) => {
                if *mapped {
                    return Err(map_error("already mapped"));
                }
                *mapped = true;
                staging.fill(0);
                Ok(staging.as_mut_slice())
            }
            Some(GpuObject::Buffer { .. }) => Err(map_error("buffer has no CPU write access")),
            _ => Err(ResourceCreationError::InvalidHandle(buffer)),
        }
    }

    fn unmap(&mut self, context: ResourceId, buffer: ResourceId) {
        if !self.is_context(context) {
            return;
        }
        let Some(core) = self.core.as_ref() else {
            return;
        };
        if let Some(GpuObject::Buffer {
            buffer: gpu_buffer,
            staging,
            mapped,
            ..
        }) = self.objects.get_mut(buffer)
        {
            if *mapped {
                core.queue.write_buffer(gpu_buffer, 0, staging);
                *mapped = false;
            }
        }
    }

    fn set_render_target(&mut self, context: ResourceId, view: ResourceId) {
        if self.is_context(context) {
            self.context.render_target = Some(view);
        }
    }

    fn set_viewport(&mut self, context: ResourceId, viewport: &Viewport) {
        if self.is_context(context) {
            self.context.viewport = Some(*viewport);
        }
    }

    fn clear_render_target(&mut self, context: ResourceId, view: ResourceId, color: Color) {
        if self.is_context(context) {
            self.context.pending_clear = Some((view, color));
        }
    }

    fn set_shaders(&mut self, context: ResourceId, vertex: ResourceId, pixel: ResourceId) {
        if self.is_context(context) {
            self.context.shaders = Some((vertex, pixel));
        }
    }

    fn set_input_layout(&mut self, context: ResourceId, layout: ResourceId) {
        if self.is_context(context) {
            self.context.input_layout = Some(layout);
        }
    }

    fn set_vertex_buffer(
        &mut self,
        context: ResourceId,
        slot: u32,
        buffer: ResourceId,
        stride: u32,
        offset: u32,
    ) {
        if slot != 0 {
            log::warn!("vertex buffer slot {slot} ignored, only slot 0 is supported");
            return;
        }
        if self.is_context(context) {
            self.context.vertex_buffer = Some(VertexBinding {
                buffer,
                stride,
                offset,
            });
        }
    }

    fn set_primitive_topology(&mut self, context: ResourceId, topology: wgpu::PrimitiveTopology) {
        if self.is_context(context) {
            self.context.topology = Some(topology);
        }
    }

    fn draw(&mut self, context: ResourceId, vertex_count: u32, start_vertex: u32) {
        if !self.is_context(context) {
            return;
        }
        let Self {
            core,
            swap_chain,
            context: state,
            objects,
            pipelines,
            ..
        } = self;
        let (Some(core), Some(sc)) = (core.as_ref(), swap_chain.as_ref()) else {
            return;
        };
        let (Some(key), Some(target), Some(viewport), Some(binding)) = (
            state.pipeline_key(),
            state.render_target,
            state.viewport,
            state.vertex_buffer,
        ) else {
            log::warn!("draw skipped: pipeline state is incomplete");
            return;
        };

        if !pipelines.contains_key(&key) {
            let Some(pipeline) = build_pipeline(&core.device, &sc.desc, objects, key) else {
                log::warn!("draw skipped: bound shaders or layout are not live");
                return;
            };
            pipelines.insert(key, pipeline);
        }
        let Some(pipeline) = pipelines.get(&key) else {
            return;
        };
        let Some(GpuObject::RenderTargetView(view)) = objects.get(target) else {
            return;
        };
        let Some(GpuObject::Buffer { buffer, mapped, .. }) = objects.get(binding.buffer) else {
            return;
        };
        if *mapped {
            log::warn!("draw skipped: {} is still mapped", binding.buffer);
            return;
        }
        let Some(viewport) = viewport.clamped_to(sc.desc.width, sc.desc.height) else {
            return;
        };

        let load = match state.pending_clear.take() {
            Some((cleared, color)) if cleared == target => wgpu::LoadOp::Clear(color.into()),
            other => {
                state.pending_clear = other;
                wgpu::LoadOp::Load
            }
        };

        let encoder = state.encoder.get_or_insert_with(|| {
            core.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tin frame encoder"),
                })
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tin draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_viewport(
            viewport.top_left_x,
            viewport.top_left_y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );
        pass.set_vertex_buffer(0, buffer.slice(u64::from(binding.offset)..));
        pass.draw(start_vertex..start_vertex + vertex_count, 0..1);
    }

    fn present(
        &mut self,
        swap_chain: ResourceId,
        sync_interval: u32,
    ) -> Result<PresentOutcome, PresentError> {
        if let Some(reason) = self.take_lost() {
            return Err(PresentError::DeviceLost(DeviceLostError { reason }));
        }
        if !matches!(self.objects.get(swap_chain), Some(GpuObject::SwapChain)) {
            return Ok(PresentOutcome::Skipped);
        }
        let Some(mut encoder) = self.context.encoder.take().or_else(|| {
            self.device().map(|device| {
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tin frame encoder"),
                })
            })
        }) else {
            return Ok(PresentOutcome::Skipped);
        };
        self.flush_clear(&mut encoder);

        let (Some(core), Some(sc)) = (self.core.as_ref(), self.swap_chain.as_mut()) else {
            return Ok(PresentOutcome::Skipped);
        };

        let mode = surface::present_mode_for(sync_interval);
        if sc.config.present_mode != mode {
            log::debug!("sync interval {sync_interval}: switching to {mode:?}");
            sc.config.present_mode = mode;
            sc.surface.configure(&core.device, &sc.config);
        }

        let frame = match sc.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                // rendered work still reaches the back buffer
                core.queue.submit(std::iter::once(encoder.finish()));
                return match surface::map_surface_error(&sc.surface, &core.device, &sc.config, err)
                {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        Ok(PresentOutcome::Skipped)
                    }
                    SurfaceErrorAction::Fatal => Err(PresentError::OutOfMemory),
                };
            }
        };

        if sc.desc.sample_count > 1 {
            let source = sc
                .back_buffer
                .create_view(&wgpu::TextureViewDescriptor::default());
            let target = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let _resolve = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tin resolve pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &source,
                    resolve_target: Some(&target),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        } else {
            encoder.copy_texture_to_texture(
                sc.back_buffer.as_image_copy(),
                frame.texture.as_image_copy(),
                wgpu::Extent3d {
                    width: sc.config.width,
                    height: sc.config.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        core.queue.submit(std::iter::once(encoder.finish()));
        if let Some(window) = self.window {
            window.pre_present_notify();
        }
        frame.present();
        Ok(PresentOutcome::Presented)
    }

    fn release(&mut self, id: ResourceId) -> bool {
        let Some(object) = self.objects.remove(id) else {
            log::warn!("release of {id}, which is not live");
            return false;
        };
        self.context.forget(id);
        self.pipelines.retain(|key, _| !key.references(id));

        match object {
            GpuObject::Device => {
                if !self.objects.is_empty() {
                    log::warn!("device released while {} objects are alive", self.objects.len());
                }
                self.pipelines.clear();
                self.context.encoder = None;
                self.core = None;
            }
            GpuObject::Context => {
                self.context = ImmediateContext::default();
            }
            GpuObject::SwapChain => {
                self.swap_chain = None;
                self.window = None;
            }
            GpuObject::Buffer { buffer, .. } => buffer.destroy(),
            GpuObject::BackBuffer
            | GpuObject::RenderTargetView(_)
            | GpuObject::Shader { .. }
            | GpuObject::InputLayout(_) => {}
        }
        log::trace!("released {id}");
        true
    }
}
