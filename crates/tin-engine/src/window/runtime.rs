use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{FrameConfig, FrameLoop, HostEvent, LoopControl, SessionAssets};
use crate::device::{DeviceConfig, WgpuBackend};

/// Window and rendering configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub device: DeviceConfig,
    pub frame: FrameConfig,
    pub assets: SessionAssets,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tin engine".to_string(),
            device: DeviceConfig::default(),
            frame: FrameConfig::default(),
            assets: SessionAssets::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and renders until it is closed.
    ///
    /// Returns the exit code carried by the quit event.
    pub fn run(config: RuntimeConfig) -> Result<i32> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut host = WindowHost::new(config);

        event_loop
            .run_app(&mut host)
            .context("winit event loop terminated with error")?;

        host.finish()
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[not_covariant]
    frame_loop: FrameLoop<WgpuBackend<'this>>,
}

struct WindowHost {
    config: RuntimeConfig,
    entry: Option<WindowEntry>,
    exit_code: Option<i32>,
    failure: Option<anyhow::Error>,
}

impl WindowHost {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            entry: None,
            exit_code: None,
            failure: None,
        }
    }

    fn create_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let device = self.config.device.clone();
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(device.width, device.height));

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let frame = self.config.frame.clone();
        let assets = self.config.assets.clone();

        WindowEntryTryBuilder {
            window,
            frame_loop_builder: |w| {
                FrameLoop::start(WgpuBackend::new(), w, device, frame, assets)
            },
        }
        .try_build()
        .context("failed to initialize rendering")
    }

    /// Forwards one event; stops the event loop on quit or failure.
    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        match entry.with_frame_loop_mut(|frame_loop| frame_loop.handle(event)) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit(code)) => {
                self.exit_code = Some(code);
                self.close(event_loop);
            }
            Err(e) => {
                log::error!("frame loop failed: {e}");
                self.failure = Some(anyhow::Error::new(e).context("frame loop failed"));
                self.close(event_loop);
            }
        }
    }

    /// Drops the session before the window it renders into.
    fn close(&mut self, event_loop: &ActiveEventLoop) {
        self.entry = None;
        event_loop.exit();
    }

    fn finish(self) -> Result<i32> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.exit_code.unwrap_or(0)),
        }
    }
}

impl ApplicationHandler for WindowHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.failure.is_some() {
            return;
        }

        match self.create_entry(event_loop) {
            Ok(entry) => {
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
            }
            Err(e) => {
                log::error!("failed to start: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        // continuous redraw
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let host_event = match event {
            WindowEvent::RedrawRequested => HostEvent::Tick,
            WindowEvent::Resized(size) => HostEvent::Resize {
                width: size.width,
                height: size.height,
            },
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                HostEvent::Quit { exit_code: 0 }
            }
            _ => return,
        };
        self.dispatch(event_loop, host_event);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.entry = None;
    }
}
