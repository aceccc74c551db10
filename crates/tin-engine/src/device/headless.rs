//! In-memory [`Backend`] that records what the core asks of the GPU.
//!
//! Objects are tracked by handle, which makes double releases, leaks and
//! teardown ordering observable. A mock vertical-blank clock stands in for
//! display timing, and individual creation steps can be made to fail.

use std::collections::HashSet;
use std::time::Duration;

use crate::coords::{Color, Viewport};
use crate::pipeline::{ResolvedElement, ShaderBlob, ShaderStage};

use super::backend::{
    Backend, BufferDesc, BufferUsage, DeviceHandles, PresentOutcome, ResourceId, ResourceKind,
    SwapChainDesc,
};
use super::config::DeviceConfig;
use super::error::{DeviceCreationError, DeviceLostError, PresentError, ResourceCreationError};
use super::resources::ResourceTable;

/// Stand-in for a native window.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HeadlessWindow {
    pub id: u64,
}

/// Creation step that can be forced to fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Adapter,
    Device,
    SwapChain,
    BackBuffer,
    RenderTargetView,
    VertexShader,
    PixelShader,
    InputLayout,
    Buffer,
    Map,
    ResizeBuffers,
}

/// Simulated display refresh.
///
/// Time only moves when the test advances it or a synchronized present waits
/// for vertical blanks.
#[derive(Debug, Clone)]
pub struct VsyncClock {
    refresh: Duration,
    now: Duration,
    vblanks: u64,
}

impl VsyncClock {
    /// 60 Hz.
    pub const DEFAULT_REFRESH: Duration = Duration::from_nanos(16_666_667);

    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            now: Duration::ZERO,
            vblanks: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Vertical blanks waited for so far.
    pub fn vblanks(&self) -> u64 {
        self.vblanks
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    /// Simulates CPU work between presents.
    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    /// Blocks until the `count`-th upcoming vertical blank.
    fn wait_for_vblanks(&mut self, count: u32) {
        let period = self.refresh.as_nanos().max(1);
        let elapsed = self.now.as_nanos() / period;
        let target = (elapsed + u128::from(count)) * period;
        self.now = Duration::from_nanos(u64::try_from(target).unwrap_or(u64::MAX));
        self.vblanks += u64::from(count);
    }
}

impl Default for VsyncClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REFRESH)
    }
}

/// One recorded draw with the state it was issued under.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub vertex_count: u32,
    pub start_vertex: u32,
    pub topology: wgpu::PrimitiveTopology,
    pub render_target: ResourceId,
    pub viewport: Viewport,
    pub vertex_buffer: ResourceId,
    pub stride: u32,
    pub offset: u32,
}

/// Everything the core issued, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetRenderTarget(ResourceId),
    SetViewport(Viewport),
    ClearRenderTarget { view: ResourceId, color: Color },
    SetShaders { vertex: ResourceId, pixel: ResourceId },
    SetInputLayout(ResourceId),
    SetVertexBuffer { slot: u32, buffer: ResourceId, stride: u32, offset: u32 },
    SetPrimitiveTopology(wgpu::PrimitiveTopology),
    Map(ResourceId),
    Unmap(ResourceId),
    Draw(DrawCall),
    Present { sync_interval: u32 },
    ResizeBuffers { width: u32, height: u32 },
    SetFullscreenState(bool),
    Release(ResourceId),
}

enum Object {
    Device,
    Context,
    SwapChain(SwapChainDesc),
    BackBuffer,
    RenderTargetView,
    Shader,
    InputLayout,
    Buffer {
        usage: BufferUsage,
        contents: Vec<u8>,
        mapped: bool,
    },
}

#[derive(Debug, Default)]
struct Bound {
    render_target: Option<ResourceId>,
    viewport: Option<Viewport>,
    shaders: Option<(ResourceId, ResourceId)>,
    input_layout: Option<ResourceId>,
    vertex_buffer: Option<(ResourceId, u32, u32)>,
    topology: Option<wgpu::PrimitiveTopology>,
}

impl Bound {
    fn forget(&mut self, id: ResourceId) {
        if self.render_target == Some(id) {
            self.render_target = None;
        }
        if self.shaders.is_some_and(|(vs, ps)| vs == id || ps == id) {
            self.shaders = None;
        }
        if self.input_layout == Some(id) {
            self.input_layout = None;
        }
        if self.vertex_buffer.is_some_and(|(buffer, _, _)| buffer == id) {
            self.vertex_buffer = None;
        }
    }
}

pub struct HeadlessBackend {
    objects: ResourceTable<Object>,
    bound: Bound,
    commands: Vec<Command>,
    released: Vec<ResourceId>,
    stray_releases: usize,
    violations: Vec<String>,
    failures: HashSet<FailPoint>,
    supported_sample_counts: Vec<u32>,
    lost: Option<String>,
    clock: VsyncClock,
    devices_created: usize,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            objects: ResourceTable::new(),
            bound: Bound::default(),
            commands: Vec::new(),
            released: Vec::new(),
            stray_releases: 0,
            violations: Vec::new(),
            failures: HashSet::new(),
            supported_sample_counts: vec![1, 2, 4, 8],
            lost: None,
            clock: VsyncClock::default(),
            devices_created: 0,
        }
    }

    /// Makes every future attempt at `point` fail until cleared.
    pub fn fail_at(&mut self, point: FailPoint) {
        self.failures.insert(point);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn set_supported_sample_counts(&mut self, counts: &[u32]) {
        self.supported_sample_counts = counts.to_vec();
    }

    /// Presents fail with device-lost until a new device is created.
    pub fn lose_device(&mut self, reason: impl Into<String>) {
        self.lost = Some(reason.into());
    }

    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.objects.count_of(kind)
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.objects.contains(id)
    }

    /// Releases of handles that were not live.
    pub fn stray_releases(&self) -> usize {
        self.stray_releases
    }

    /// Successful releases, in order.
    pub fn released(&self) -> &[ResourceId] {
        &self.released
    }

    /// Misuse that a real driver would reject or silently ignore.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    pub fn presents(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Present { .. }))
            .count()
    }

    pub fn devices_created(&self) -> usize {
        self.devices_created
    }

    pub fn clock(&self) -> &VsyncClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut VsyncClock {
        &mut self.clock
    }

    pub fn buffer_contents(&self, buffer: ResourceId) -> Option<&[u8]> {
        match self.objects.get(buffer) {
            Some(Object::Buffer { contents, .. }) => Some(contents),
            _ => None,
        }
    }

    fn fails(&self, point: FailPoint) -> bool {
        self.failures.contains(&point)
    }

    fn has_device(&self) -> bool {
        self.objects.count_of(ResourceKind::Device) > 0
    }

    fn is_context(&mut self, context: ResourceId, operation: &str) -> bool {
        let ok = matches!(self.objects.get(context), Some(Object::Context));
        if !ok {
            self.violations
                .push(format!("{operation} on {context}, which is not a live context"));
        }
        ok
    }

    fn create_shader(
        &mut self,
        blob: &ShaderBlob,
        stage: ShaderStage,
        kind: ResourceKind,
        point: FailPoint,
    ) -> Result<ResourceId, ResourceCreationError> {
        let reason = if self.fails(point) {
            Some("injected failure".to_owned())
        } else if !self.has_device() {
            Some("no live device".to_owned())
        } else if blob.stage() != stage {
            Some(format!("blob was compiled for the {} stage", blob.stage()))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ResourceCreationError::ShaderStage { stage, reason }),
            None => Ok(self.objects.insert(kind, Object::Shader)),
        }
    }
}

impl Backend for HeadlessBackend {
    type Window = HeadlessWindow;

    fn create_device(
        &mut self,
        window: HeadlessWindow,
        config: &DeviceConfig,
    ) -> Result<DeviceHandles, DeviceCreationError> {
        if self.fails(FailPoint::Adapter) {
            return Err(DeviceCreationError::NoAdapter("injected failure".into()));
        }
        if self.fails(FailPoint::Device) {
            return Err(DeviceCreationError::Device("injected failure".into()));
        }
        let format = wgpu::TextureFormat::Rgba8Unorm;
        if !self.supported_sample_counts.contains(&config.sample_count) {
            return Err(DeviceCreationError::UnsupportedSampleCount {
                requested: config.sample_count,
                format,
            });
        }
        if self.fails(FailPoint::SwapChain) {
            return Err(DeviceCreationError::SwapChain("injected failure".into()));
        }

        let device = self.objects.insert(ResourceKind::Device, Object::Device);
        let context = self.objects.insert(ResourceKind::Context, Object::Context);
        let desc = SwapChainDesc::from_config(config, format);
        let swap_chain = self
            .objects
            .insert(ResourceKind::SwapChain, Object::SwapChain(desc));

        self.lost = None;
        self.devices_created += 1;
        log::debug!("headless device {device} for window {}", window.id);

        Ok(DeviceHandles {
            device,
            context,
            swap_chain,
        })
    }

    fn swap_chain_desc(&self, swap_chain: ResourceId) -> Option<SwapChainDesc> {
        match self.objects.get(swap_chain) {
            Some(Object::SwapChain(desc)) => Some(*desc),
            _ => None,
        }
    }

    fn set_fullscreen_state(&mut self, swap_chain: ResourceId, fullscreen: bool) {
        self.commands.push(Command::SetFullscreenState(fullscreen));
        if let Some(Object::SwapChain(desc)) = self.objects.get_mut(swap_chain) {
            desc.windowed = !fullscreen;
        }
    }

    fn resize_buffers(
        &mut self,
        swap_chain: ResourceId,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceCreationError> {
        if self.fails(FailPoint::ResizeBuffers) {
            return Err(ResourceCreationError::ResizeBuffers("injected failure".into()));
        }
        let views = self.objects.count_of(ResourceKind::RenderTargetView)
            + self.objects.count_of(ResourceKind::BackBuffer);
        if views > 0 {
            return Err(ResourceCreationError::ResizeBuffers(format!(
                "{views} references to the back buffer are still alive"
            )));
        }
        let Some(Object::SwapChain(desc)) = self.objects.get_mut(swap_chain) else {
            return Err(ResourceCreationError::InvalidHandle(swap_chain));
        };
        desc.width = width;
        desc.height = height;
        self.commands.push(Command::ResizeBuffers { width, height });
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
        if self.fails(FailPoint::BackBuffer) {
            return Err(ResourceCreationError::BackBuffer {
                index,
                reason: "injected failure".into(),
            });
        }
        if index >= desc.buffer_count {
            return Err(ResourceCreationError::BackBuffer {
                index,
                reason: format!("swap chain has {} back buffers", desc.buffer_count),
            });
        }
        Ok(self.objects.insert(ResourceKind::BackBuffer, Object::BackBuffer))
    }

    fn create_render_target_view(
        &mut self,
        texture: ResourceId,
    ) -> Result<ResourceId, ResourceCreationError> {
        if !matches!(self.objects.get(texture), Some(Object::BackBuffer)) {
            return Err(ResourceCreationError::InvalidHandle(texture));
        }
        if self.fails(FailPoint::RenderTargetView) {
            return Err(ResourceCreationError::RenderTargetView("injected failure".into()));
        }
        Ok(self
            .objects
            .insert(ResourceKind::RenderTargetView, Object::RenderTargetView))
    }

    fn create_vertex_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError> {
        self.create_shader(
            blob,
            ShaderStage::Vertex,
            ResourceKind::VertexShader,
            FailPoint::VertexShader,
        )
    }

    fn create_pixel_shader(&mut self, blob: &ShaderBlob) -> Result<ResourceId, ResourceCreationError> {
        self.create_shader(
            blob,
            ShaderStage::Pixel,
            ResourceKind::PixelShader,
            FailPoint::PixelShader,
        )
    }

    fn create_input_layout(
        &mut self,
        elements: &[ResolvedElement],
        _vertex_shader: &ShaderBlob,
    ) -> Result<ResourceId, ResourceCreationError> {
        if self.fails(FailPoint::InputLayout) {
            return Err(ResourceCreationError::InputLayout("injected failure".into()));
        }
        if !self.has_device() {
            return Err(ResourceCreationError::InputLayout("no live device".into()));
        }
        if elements.is_empty() {
            return Err(ResourceCreationError::InputLayout("no elements".into()));
        }
        Ok(self.objects.insert(ResourceKind::InputLayout, Object::InputLayout))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ResourceId, ResourceCreationError> {
        if self.fails(FailPoint::Buffer) {
            return Err(ResourceCreationError::Buffer("injected failure".into()));
        }
        if !self.has_device() {
            return Err(ResourceCreationError::Buffer("no live device".into()));
        }
        let Ok(len) = usize::try_from(desc.byte_width) else {
            return Err(ResourceCreationError::Buffer(format!(
                "{} bytes do not fit in memory",
                desc.byte_width
            )));
        };
        if len == 0 {
            return Err(ResourceCreationError::Buffer(format!("`{}` is empty", desc.label)));
        }
        Ok(self.objects.insert(
            ResourceKind::Buffer,
            Object::Buffer {
                usage: desc.usage,
                contents: vec![0; len],
                mapped: false,
            },
        ))
    }

    fn map_discard(
        &mut self,
        context: ResourceId,
        buffer: ResourceId,
    ) -> Result<&mut [u8], ResourceCreationError> {
        let map_error = |reason: &str| ResourceCreationError::Map {
            id: buffer,
            reason: reason.to_owned(),
        };
        if self.fails(FailPoint::Map) {
            return Err(map_error("injected failure"));
        }
        if !self.is_context(context, "map_discard") {
            return Err(ResourceCreationError::InvalidHandle(context));
        }
        self.commands.push(Command::Map(buffer));
        match self.objects.get_mut(buffer) {
            Some(Object::Buffer {
                usage: BufferUsage::DynamicWrite,
                contents,
                mapped,
            }) => {
                if *mapped {
                    return Err(map_error("already mapped"));
                }
                *mapped = true;
                contents.fill(0);
                Ok(contents.as_mut_slice())
            }
            Some(Object::Buffer { .. }) => Err(map_error("buffer has no CPU write access")),
            _ => Err(ResourceCreationError::InvalidHandle(buffer)),
        }
    }

    fn unmap(&mut self, context: ResourceId, buffer: ResourceId) {
        if !self.is_context(context, "unmap") {
            return;
        }
        self.commands.push(Command::Unmap(buffer));
        match self.objects.get_mut(buffer) {
            Some(Object::Buffer { mapped, .. }) if *mapped => *mapped = false,
            _ => self.violations.push(format!("unmap of {buffer}, which is not mapped")),
        }
    }

    fn set_render_target(&mut self, context: ResourceId, view: ResourceId) {
        if !self.is_context(context, "set_render_target") {
            return;
        }
        self.commands.push(Command::SetRenderTarget(view));
        self.bound.render_target = Some(view);
    }

    fn set_viewport(&mut self, context: ResourceId, viewport: &Viewport) {
        if !self.is_context(context, "set_viewport") {
            return;
        }
        self.commands.push(Command::SetViewport(*viewport));
        self.bound.viewport = Some(*viewport);
    }

    fn clear_render_target(&mut self, context: ResourceId, view: ResourceId, color: Color) {
        if !self.is_context(context, "clear_render_target") {
            return;
        }
        self.commands.push(Command::ClearRenderTarget { view, color });
    }

    fn set_shaders(&mut self, context: ResourceId, vertex: ResourceId, pixel: ResourceId) {
        if !self.is_context(context, "set_shaders") {
            return;
        }
        self.commands.push(Command::SetShaders { vertex, pixel });
        self.bound.shaders = Some((vertex, pixel));
    }

    fn set_input_layout(&mut self, context: ResourceId, layout: ResourceId) {
        if !self.is_context(context, "set_input_layout") {
            return;
        }
        self.commands.push(Command::SetInputLayout(layout));
        self.bound.input_layout = Some(layout);
    }

    fn set_vertex_buffer(
        &mut self,
        context: ResourceId,
        slot: u32,
        buffer: ResourceId,
        stride: u32,
        offset: u32,
    ) {
        if !self.is_context(context, "set_vertex_buffer") {
            return;
        }
        self.commands.push(Command::SetVertexBuffer {
            slot,
            buffer,
            stride,
            offset,
        });
        if slot == 0 {
            self.bound.vertex_buffer = Some((buffer, stride, offset));
        }
    }

    fn set_primitive_topology(&mut self, context: ResourceId, topology: wgpu::PrimitiveTopology) {
        if !self.is_context(context, "set_primitive_topology") {
            return;
        }
        self.commands.push(Command::SetPrimitiveTopology(topology));
        self.bound.topology = Some(topology);
    }

    fn draw(&mut self, context: ResourceId, vertex_count: u32, start_vertex: u32) {
        if !self.is_context(context, "draw") {
            return;
        }
        let bound = &self.bound;
        let (
            Some(render_target),
            Some(viewport),
            Some(_),
            Some(_),
            Some((vertex_buffer, stride, offset)),
            Some(topology),
        ) = (
            bound.render_target,
            bound.viewport,
            bound.shaders,
            bound.input_layout,
            bound.vertex_buffer,
            bound.topology,
        )
        else {
            self.violations
                .push(format!("draw with incomplete pipeline state: {bound:?}"));
            return;
        };
        if matches!(
            self.objects.get(vertex_buffer),
            Some(Object::Buffer { mapped: true, .. })
        ) {
            self.violations
                .push(format!("draw from {vertex_buffer} while it is mapped"));
            return;
        }
        self.commands.push(Command::Draw(DrawCall {
            vertex_count,
            start_vertex,
            topology,
            render_target,
            viewport,
            vertex_buffer,
            stride,
            offset,
        }));
    }

    fn present(
        &mut self,
        swap_chain: ResourceId,
        sync_interval: u32,
    ) -> Result<PresentOutcome, PresentError> {
        if let Some(reason) = &self.lost {
            return Err(PresentError::DeviceLost(DeviceLostError {
                reason: reason.clone(),
            }));
        }
        if self.swap_chain_desc(swap_chain).is_none() {
            self.violations
                .push(format!("present on {swap_chain}, which is not a live swap chain"));
            return Ok(PresentOutcome::Skipped);
        }
        if sync_interval > 0 {
            self.clock.wait_for_vblanks(sync_interval);
        }
        self.commands.push(Command::Present { sync_interval });
        Ok(PresentOutcome::Presented)
    }

    fn release(&mut self, id: ResourceId) -> bool {
        if self.objects.remove(id).is_none() {
            self.stray_releases += 1;
            self.violations.push(format!("release of {id}, which is not live"));
            return false;
        }
        if id.kind() == ResourceKind::Device && !self.objects.is_empty() {
            let children: Vec<String> = self.objects.iter().map(|(id, _)| id.to_string()).collect();
            self.violations.push(format!(
                "device released while children are alive: {}",
                children.join(", ")
            ));
        }
        if id.kind() == ResourceKind::Context {
            self.bound = Bound::default();
        }
        self.bound.forget(id);
        self.released.push(id);
        self.commands.push(Command::Release(id));
        true
    }
}
