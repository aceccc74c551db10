use crate::coords::Viewport;
use crate::device::{
    Backend, BufferUsage, DeviceConfig, GraphicsDevice, LifecycleError, PresentOutcome,
    PresentationSurface, RenderError, ResourceId,
};
use crate::geometry::GeometryBuffer;
use crate::mesh::{Vertex, TRIANGLE};
use crate::pipeline::{PipelineState, ShaderSource, DEFAULT_SHADER, VERTEX_ELEMENTS};

use super::frame_loop::FrameConfig;

/// Inputs needed to (re)build a session from scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAssets {
    pub shader: ShaderSource,
    pub mesh: Vec<Vertex>,
}

impl Default for SessionAssets {
    fn default() -> Self {
        Self {
            shader: DEFAULT_SHADER,
            mesh: TRIANGLE.to_vec(),
        }
    }
}

/// Every GPU object of the application, created in dependency order and
/// released in reverse.
///
/// Each step checks that the one before it ran, so calling things out of
/// order returns [`LifecycleError::OutOfOrder`] instead of touching the GPU.
/// Dropping the session tears it down.
pub struct RenderingSession<B: Backend> {
    backend: B,
    config: DeviceConfig,
    window: Option<B::Window>,
    assets: Option<SessionAssets>,

    device: Option<GraphicsDevice>,
    surface: Option<PresentationSurface>,
    viewport: Option<Viewport>,
    pipeline: Option<PipelineState>,
    geometry: Option<GeometryBuffer>,
}

impl<B: Backend> RenderingSession<B> {
    pub fn new(backend: B, config: DeviceConfig) -> Self {
        Self {
            backend,
            config,
            window: None,
            assets: None,
            device: None,
            surface: None,
            viewport: None,
            pipeline: None,
            geometry: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn surface(&self) -> Option<&PresentationSurface> {
        self.surface.as_ref()
    }

    pub fn pipeline(&self) -> Option<&PipelineState> {
        self.pipeline.as_ref()
    }

    pub fn geometry(&self) -> Option<&GeometryBuffer> {
        self.geometry.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// All components exist; frames can be drawn.
    pub fn is_ready(&self) -> bool {
        self.device.is_some()
            && self.surface.as_ref().is_some_and(|s| s.render_target().is_some())
            && self.viewport.is_some()
            && self.pipeline.is_some()
            && self.geometry.is_some()
    }

    fn context(&self, operation: &'static str) -> Result<ResourceId, LifecycleError> {
        self.device
            .as_ref()
            .and_then(GraphicsDevice::context)
            .ok_or(LifecycleError::OutOfOrder {
                operation,
                requires: "create_device",
            })
    }

    pub fn create_device(&mut self, window: B::Window) -> Result<(), RenderError> {
        if self.device.is_some() {
            return Err(LifecycleError::AlreadyCreated("device").into());
        }
        let (device, surface) =
            GraphicsDevice::create(&mut self.backend, window.clone(), &self.config)?;
        self.window = Some(window);
        self.device = Some(device);
        self.surface = Some(surface);
        Ok(())
    }

    pub fn bind_render_target(&mut self) -> Result<ResourceId, RenderError> {
        let context = self.context("bind_render_target")?;
        let surface = self.surface.as_mut().ok_or(LifecycleError::OutOfOrder {
            operation: "bind_render_target",
            requires: "create_device",
        })?;
        surface.bind_render_target(&mut self.backend, context)
    }

    pub fn set_viewport(&mut self) -> Result<Viewport, RenderError> {
        let context = self.context("set_viewport")?;
        let surface = self.surface.as_ref().ok_or(LifecycleError::OutOfOrder {
            operation: "set_viewport",
            requires: "create_device",
        })?;
        let viewport = surface.set_viewport(&mut self.backend, context)?;
        self.viewport = Some(viewport);
        Ok(viewport)
    }

    /// Compiles `shader`, creates both stages and the vertex input layout and
    /// binds them.
    pub fn build_pipeline(&mut self, shader: &ShaderSource) -> Result<(), RenderError> {
        let context = self.context("build_pipeline")?;
        if self.pipeline.is_some() {
            return Err(LifecycleError::AlreadyCreated("pipeline").into());
        }
        let pipeline =
            PipelineState::build(&mut self.backend, shader, &VERTEX_ELEMENTS, &Vertex::LAYOUT)?;
        pipeline.bind_stages(&mut self.backend, context);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Creates the vertex buffer and fills it with `mesh`.
    pub fn upload_geometry(&mut self, mesh: &[Vertex]) -> Result<(), RenderError> {
        let context = self.context("upload_geometry")?;
        if self.pipeline.is_none() {
            return Err(LifecycleError::OutOfOrder {
                operation: "upload_geometry",
                requires: "build_pipeline",
            }
            .into());
        }
        if self.geometry.is_some() {
            return Err(LifecycleError::AlreadyCreated("geometry").into());
        }

        let mut geometry = GeometryBuffer::create(&mut self.backend, mesh, BufferUsage::DynamicWrite)?;
        if let Err(err) = geometry.upload(&mut self.backend, context, mesh) {
            geometry.release(&mut self.backend);
            return Err(err.into());
        }
        self.geometry = Some(geometry);
        Ok(())
    }

    /// Runs every creation step in order. On failure the partial session is
    /// torn down and the first error returned.
    pub fn initialize(&mut self, window: B::Window, assets: SessionAssets) -> Result<(), RenderError> {
        if self.device.is_some() {
            return Err(LifecycleError::AlreadyCreated("device").into());
        }
        let result = self.initialize_steps(window, &assets);
        self.assets = Some(assets);
        match result {
            Ok(()) => {
                log::info!("rendering session ready");
                Ok(())
            }
            Err(err) => {
                log::error!("session initialization failed: {err}");
                self.teardown();
                Err(err)
            }
        }
    }

    fn initialize_steps(&mut self, window: B::Window, assets: &SessionAssets) -> Result<(), RenderError> {
        self.create_device(window)?;
        self.bind_render_target()?;
        self.set_viewport()?;
        self.build_pipeline(&assets.shader)?;
        self.upload_geometry(&assets.mesh)?;
        Ok(())
    }

    /// Binds everything and draws the mesh once as a triangle list, then
    /// presents.
    pub fn draw_frame(&mut self, frame: &FrameConfig) -> Result<PresentOutcome, RenderError> {
        let context = self.context("draw_frame")?;
        let out_of_order = |requires| LifecycleError::OutOfOrder {
            operation: "draw_frame",
            requires,
        };
        let surface = self.surface.as_mut().ok_or(out_of_order("create_device"))?;
        if surface.render_target().is_none() {
            return Err(out_of_order("bind_render_target").into());
        }
        let viewport = self.viewport.ok_or(out_of_order("set_viewport"))?;
        let pipeline = self.pipeline.as_ref().ok_or(out_of_order("build_pipeline"))?;
        let geometry = self.geometry.as_ref().ok_or(out_of_order("upload_geometry"))?;

        let backend = &mut self.backend;
        let view = surface.bind_render_target(backend, context)?;
        backend.set_viewport(context, &viewport);
        if let Some(color) = frame.clear_color {
            backend.clear_render_target(context, view, color);
        }
        pipeline.bind_stages(backend, context);
        geometry.bind(backend, context);
        backend.set_primitive_topology(context, wgpu::PrimitiveTopology::TriangleList);
        backend.draw(context, geometry.vertex_count(), 0);

        surface.present(backend, frame.sync_interval)
    }

    /// Rebuilds the render target and viewport for a new back-buffer size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let context = self.context("resize")?;
        let surface = self.surface.as_mut().ok_or(LifecycleError::OutOfOrder {
            operation: "resize",
            requires: "create_device",
        })?;
        let resized = surface.resize(&mut self.backend, context, width, height);
        // follows whatever back buffer is bound now, old or new
        self.viewport = surface.set_viewport(&mut self.backend, context).ok();
        resized?;
        self.config.width = width;
        self.config.height = height;
        Ok(())
    }

    /// Tears everything down and initializes again with the same window and
    /// assets. Used after the device was lost.
    pub fn recreate(&mut self) -> Result<(), RenderError> {
        let window = self.window.clone().ok_or(LifecycleError::OutOfOrder {
            operation: "recreate",
            requires: "create_device",
        })?;
        let assets = self.assets.clone().ok_or(LifecycleError::OutOfOrder {
            operation: "recreate",
            requires: "initialize",
        })?;
        log::warn!("recreating rendering session");
        self.teardown();
        self.initialize(window, assets)
    }

    /// Releases geometry, pipeline, surface and device in that order.
    ///
    /// Only objects that exist are released; calling this again is a no-op.
    pub fn teardown(&mut self) {
        if self.device.is_none()
            && self.surface.is_none()
            && self.pipeline.is_none()
            && self.geometry.is_none()
        {
            return;
        }
        if let Some(mut geometry) = self.geometry.take() {
            geometry.release(&mut self.backend);
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.release(&mut self.backend);
        }
        self.viewport = None;
        if let Some(mut surface) = self.surface.take() {
            surface.release(&mut self.backend);
        }
        if let Some(mut device) = self.device.take() {
            device.release(&mut self.backend);
        }
        log::info!("rendering session torn down");
    }
}

impl<B: Backend> Drop for RenderingSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Color;
    use crate::device::{
        Command, FailPoint, HeadlessBackend, HeadlessWindow, ResourceCreationError, ResourceKind,
    };

    fn session() -> RenderingSession<HeadlessBackend> {
        RenderingSession::new(HeadlessBackend::new(), DeviceConfig::default())
    }

    fn ready() -> RenderingSession<HeadlessBackend> {
        let mut s = session();
        s.initialize(HeadlessWindow::default(), SessionAssets::default())
            .unwrap();
        s
    }

    // ── lifecycle order ──────────────────────────────────────────────────

    #[test]
    fn bind_render_target_before_create_fails() {
        let mut s = session();
        match s.bind_render_target() {
            Err(RenderError::Lifecycle(LifecycleError::OutOfOrder {
                operation,
                requires,
            })) => assert_eq!((operation, requires), ("bind_render_target", "create_device")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.backend().live_count(), 0);
    }

    #[test]
    fn set_viewport_before_render_target_fails() {
        let mut s = session();
        s.create_device(HeadlessWindow::default()).unwrap();
        assert!(matches!(
            s.set_viewport(),
            Err(RenderError::Lifecycle(LifecycleError::OutOfOrder {
                requires: "bind_render_target",
                ..
            }))
        ));
    }

    #[test]
    fn geometry_before_pipeline_fails() {
        let mut s = session();
        s.create_device(HeadlessWindow::default()).unwrap();
        assert!(matches!(
            s.upload_geometry(&TRIANGLE),
            Err(RenderError::Lifecycle(LifecycleError::OutOfOrder {
                requires: "build_pipeline",
                ..
            }))
        ));
    }

    #[test]
    fn draw_before_initialize_fails() {
        let mut s = session();
        assert!(matches!(
            s.draw_frame(&FrameConfig::default()),
            Err(RenderError::Lifecycle(_))
        ));
    }

    #[test]
    fn second_device_is_rejected() {
        let mut s = ready();
        assert!(matches!(
            s.create_device(HeadlessWindow::default()),
            Err(RenderError::Lifecycle(LifecycleError::AlreadyCreated("device")))
        ));
    }

    #[test]
    fn second_initialize_is_rejected_without_side_effects() {
        let mut s = ready();
        let live = s.backend().live_count();
        let other = SessionAssets {
            mesh: TRIANGLE[..1].to_vec(),
            ..SessionAssets::default()
        };
        assert!(matches!(
            s.initialize(HeadlessWindow::default(), other),
            Err(RenderError::Lifecycle(LifecycleError::AlreadyCreated("device")))
        ));
        assert!(s.is_ready());
        assert_eq!(s.backend().live_count(), live);
        assert_eq!(s.backend().devices_created(), 1);

        // recreation still uses the assets of the first initialize
        s.recreate().unwrap();
        assert_eq!(s.geometry().unwrap().vertex_count(), 3);
    }

    // ── initialization ───────────────────────────────────────────────────

    #[test]
    fn default_config_gives_matching_surface() {
        let s = ready();
        let desc = s.surface().unwrap().desc();
        assert_eq!((desc.width, desc.height), (1366, 768));
        assert_eq!(desc.sample_count, 4);
        assert!(desc.windowed);
        assert!(s.is_ready());
    }

    #[test]
    fn failed_initialize_leaves_zero_handles() {
        for point in [
            FailPoint::SwapChain,
            FailPoint::BackBuffer,
            FailPoint::RenderTargetView,
            FailPoint::VertexShader,
            FailPoint::PixelShader,
            FailPoint::InputLayout,
            FailPoint::Buffer,
            FailPoint::Map,
        ] {
            let mut s = session();
            s.backend_mut().fail_at(point);
            assert!(
                s.initialize(HeadlessWindow::default(), SessionAssets::default())
                    .is_err(),
                "{point:?}"
            );
            assert_eq!(s.backend().live_count(), 0, "{point:?}");
            assert_eq!(s.backend().stray_releases(), 0, "{point:?}");
        }
    }

    #[test]
    fn broken_shader_is_a_compilation_error() {
        let mut s = session();
        let assets = SessionAssets {
            shader: ShaderSource::Embedded {
                name: "broken.wgsl",
                text: "fn VShader( {",
            },
            ..SessionAssets::default()
        };
        let err = s
            .initialize(HeadlessWindow::default(), assets)
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilation(_)));
        assert_eq!(s.backend().live_count(), 0);
    }

    #[test]
    fn uploaded_bytes_match_the_mesh() {
        let s = ready();
        let buffer = s.geometry().unwrap().buffer().unwrap();
        assert_eq!(
            s.backend().buffer_contents(buffer).unwrap(),
            bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE)
        );
    }

    // ── drawing ──────────────────────────────────────────────────────────

    #[test]
    fn one_frame_is_one_triangle_list_draw() {
        let mut s = ready();
        s.backend_mut().clear_commands();
        assert_eq!(
            s.draw_frame(&FrameConfig::default()).unwrap(),
            PresentOutcome::Presented
        );
        let draws = s.backend().draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].vertex_count, 3);
        assert_eq!(draws[0].start_vertex, 0);
        assert_eq!(draws[0].topology, wgpu::PrimitiveTopology::TriangleList);
        assert_eq!((draws[0].stride, draws[0].offset), (28, 0));
        assert_eq!(draws[0].viewport, Viewport::full(1366, 768));
        assert_eq!(
            s.backend().commands().last(),
            Some(&Command::Present { sync_interval: 0 })
        );
        assert!(s.backend().violations().is_empty());
    }

    #[test]
    fn clear_color_precedes_the_draw() {
        let mut s = ready();
        s.backend_mut().clear_commands();
        let frame = FrameConfig {
            clear_color: Some(Color::BLACK),
            ..FrameConfig::default()
        };
        s.draw_frame(&frame).unwrap();
        let commands = s.backend().commands();
        let clear = commands
            .iter()
            .position(|c| matches!(c, Command::ClearRenderTarget { .. }));
        let draw = commands.iter().position(|c| matches!(c, Command::Draw(_)));
        assert!(clear.unwrap() < draw.unwrap());
    }

    // ── resize ───────────────────────────────────────────────────────────

    #[test]
    fn resize_rebuilds_view_and_viewport() {
        let mut s = ready();
        s.resize(800, 600).unwrap();
        assert_eq!(s.viewport(), Some(Viewport::full(800, 600)));
        assert_eq!(s.backend().live_of(ResourceKind::RenderTargetView), 1);
        s.draw_frame(&FrameConfig::default()).unwrap();
        let draw = *s.backend().draw_calls().last().unwrap();
        assert_eq!(draw.viewport, Viewport::full(800, 600));
    }

    #[test]
    fn failed_resize_is_a_resource_error() {
        let mut s = ready();
        s.backend_mut().fail_at(FailPoint::ResizeBuffers);
        assert!(matches!(
            s.resize(800, 600),
            Err(RenderError::ResourceCreation(ResourceCreationError::ResizeBuffers(_)))
        ));
        assert_eq!(s.viewport(), Some(Viewport::full(1366, 768)));
        assert!(s.is_ready());
        assert!(s.draw_frame(&FrameConfig::default()).is_ok());
    }

    // ── teardown ─────────────────────────────────────────────────────────

    #[test]
    fn teardown_leaves_zero_live_handles() {
        let mut s = ready();
        s.teardown();
        assert_eq!(s.backend().live_count(), 0);
        assert!(s.backend().violations().is_empty());
    }

    #[test]
    fn teardown_twice_does_not_double_release() {
        let mut s = ready();
        s.teardown();
        let released = s.backend().released().len();
        s.teardown();
        assert_eq!(s.backend().released().len(), released);
        assert_eq!(s.backend().stray_releases(), 0);
    }

    #[test]
    fn teardown_runs_in_reverse_creation_order() {
        let mut s = ready();
        s.teardown();
        let kinds: Vec<ResourceKind> = s.backend().released().iter().map(|id| id.kind()).collect();
        // the back buffer reference is released while binding the render target
        assert_eq!(
            kinds,
            [
                ResourceKind::BackBuffer,
                ResourceKind::Buffer,
                ResourceKind::InputLayout,
                ResourceKind::PixelShader,
                ResourceKind::VertexShader,
                ResourceKind::RenderTargetView,
                ResourceKind::SwapChain,
                ResourceKind::Context,
                ResourceKind::Device,
            ]
        );
    }

    #[test]
    fn teardown_leaves_full_screen_before_releasing_the_swap_chain() {
        let mut s = ready();
        s.backend_mut().clear_commands();
        s.teardown();
        let commands = s.backend().commands();
        let windowed = commands
            .iter()
            .position(|c| *c == Command::SetFullscreenState(false))
            .unwrap();
        let swap_chain_released = commands
            .iter()
            .position(|c| matches!(c, Command::Release(id) if id.kind() == ResourceKind::SwapChain))
            .unwrap();
        assert!(windowed < swap_chain_released);
    }

    // ── device loss ──────────────────────────────────────────────────────

    #[test]
    fn recreate_builds_a_fresh_device() {
        let mut s = ready();
        s.backend_mut().lose_device("reset");
        let err = s.draw_frame(&FrameConfig::default()).unwrap_err();
        assert!(err.is_device_lost());

        s.recreate().unwrap();
        assert!(s.is_ready());
        assert_eq!(s.backend().devices_created(), 2);
        assert!(s.draw_frame(&FrameConfig::default()).is_ok());
    }

    #[test]
    fn recreate_needs_a_prior_initialize() {
        let mut s = session();
        assert!(matches!(
            s.recreate(),
            Err(RenderError::Lifecycle(LifecycleError::OutOfOrder { .. }))
        ));
    }
}
