use crate::coords::Color;
use crate::device::{Backend, DeviceConfig, LifecycleError, PresentOutcome, RenderError};
use crate::time::{FpsCounter, FrameClock, FrameTime};

use super::event::{EventSource, HostEvent, LoopControl};
use super::session::{RenderingSession, SessionAssets};

/// Per-frame parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameConfig {
    /// `0` presents immediately, `n` waits for `n` vertical blanks.
    pub sync_interval: u32,

    /// Clear the render target before drawing. The bootstrap draws without
    /// clearing.
    pub clear_color: Option<Color>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Rendering,
    Shutdown,
}

/// What a single tick did.
#[derive(Debug, Copy, Clone)]
pub enum FrameOutcome {
    Presented(FrameTime),
    /// The surface had no image to give; nothing became visible.
    Skipped,
    /// The device was lost and the session rebuilt; no frame this tick.
    Recovered,
    /// The window has no area.
    Suspended,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub presented: u64,
    pub skipped: u64,
    pub recoveries: u64,
}

/// Drives a [`RenderingSession`] from host events.
///
/// Idle -> Rendering on tick, back to Idle once present returned (or the
/// frame failed). Quit moves to Shutdown and tears the session down.
pub struct FrameLoop<B: Backend> {
    session: RenderingSession<B>,
    config: FrameConfig,
    state: FrameState,
    /// Set while the host reports a zero-sized client area.
    suspended: bool,
    exit_code: i32,
    clock: FrameClock,
    fps: FpsCounter,
    stats: FrameStats,
}

impl<B: Backend> FrameLoop<B> {
    pub fn new(session: RenderingSession<B>, config: FrameConfig) -> Self {
        Self {
            session,
            config,
            state: FrameState::Idle,
            suspended: false,
            exit_code: 0,
            clock: FrameClock::new(),
            fps: FpsCounter::default(),
            stats: FrameStats::default(),
        }
    }

    /// Creates and initializes a session for `window`, ready to tick.
    pub fn start(
        backend: B,
        window: B::Window,
        device: DeviceConfig,
        frame: FrameConfig,
        assets: SessionAssets,
    ) -> Result<Self, RenderError> {
        let mut session = RenderingSession::new(backend, device);
        session.initialize(window, assets)?;
        Ok(Self::new(session, frame))
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn session(&self) -> &RenderingSession<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut RenderingSession<B> {
        &mut self.session
    }

    pub fn handle(&mut self, event: HostEvent) -> Result<LoopControl, RenderError> {
        if self.state == FrameState::Shutdown {
            return Ok(LoopControl::Exit(self.exit_code));
        }
        match event {
            HostEvent::Tick => {
                self.tick()?;
                Ok(LoopControl::Continue)
            }
            HostEvent::Resize { width, height } => {
                self.resize(width, height)?;
                Ok(LoopControl::Continue)
            }
            HostEvent::Quit { exit_code } => {
                self.shutdown(exit_code);
                Ok(LoopControl::Exit(exit_code))
            }
        }
    }

    /// Renders and presents one frame.
    ///
    /// A lost device is rebuilt once; if that fails too the error is returned.
    pub fn tick(&mut self) -> Result<FrameOutcome, RenderError> {
        if self.state == FrameState::Shutdown {
            return Err(LifecycleError::ShutDown.into());
        }
        if self.suspended {
            return Ok(FrameOutcome::Suspended);
        }

        self.state = FrameState::Rendering;
        let result = self.session.draw_frame(&self.config);
        self.state = FrameState::Idle;

        match result {
            Ok(PresentOutcome::Presented) => {
                let ft = self.clock.tick();
                self.stats.presented += 1;
                if let Some(fps) = self.fps.record(ft.now) {
                    log::debug!(
                        "{fps:.1} fps (frame {}, dt {:.2} ms)",
                        ft.frame_index,
                        ft.dt * 1000.0
                    );
                }
                Ok(FrameOutcome::Presented(ft))
            }
            Ok(PresentOutcome::Skipped) => {
                self.stats.skipped += 1;
                log::warn!("frame skipped: surface image unavailable");
                Ok(FrameOutcome::Skipped)
            }
            Err(err) if err.is_device_lost() => {
                log::warn!("{err}");
                self.session.recreate()?;
                self.clock.reset();
                self.stats.recoveries += 1;
                Ok(FrameOutcome::Recovered)
            }
            Err(err) => Err(err),
        }
    }

    /// Zero area suspends rendering until a real size arrives.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if self.state == FrameState::Shutdown {
            return Err(LifecycleError::ShutDown.into());
        }
        if width == 0 || height == 0 {
            if !self.suspended {
                log::debug!("client area is empty; rendering suspended");
            }
            self.suspended = true;
            return Ok(());
        }
        self.suspended = false;

        let unchanged = self
            .session
            .surface()
            .is_some_and(|s| {
                s.render_target().is_some() && (s.desc().width, s.desc().height) == (width, height)
            });
        if unchanged {
            return Ok(());
        }
        self.session.resize(width, height)
    }

    /// Tears the session down. Later events only report the exit code.
    pub fn shutdown(&mut self, exit_code: i32) {
        if self.state == FrameState::Shutdown {
            return;
        }
        self.session.teardown();
        self.state = FrameState::Shutdown;
        self.exit_code = exit_code;
        log::info!(
            "frame loop shut down with code {exit_code} ({} frames presented, {} skipped, {} recoveries)",
            self.stats.presented,
            self.stats.skipped,
            self.stats.recoveries
        );
    }

    /// Polls `events` until quit; renders whenever nothing is pending.
    pub fn run<E: EventSource>(&mut self, events: &mut E) -> Result<i32, RenderError> {
        loop {
            let event = events.poll_event().unwrap_or(HostEvent::Tick);
            if let LoopControl::Exit(code) = self.handle(event)? {
                return Ok(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;
    use crate::coords::Viewport;
    use crate::device::{Command, FailPoint, HeadlessBackend, HeadlessWindow, ResourceKind};

    fn frame_loop(frame: FrameConfig) -> FrameLoop<HeadlessBackend> {
        FrameLoop::start(
            HeadlessBackend::new(),
            HeadlessWindow::default(),
            DeviceConfig::default(),
            frame,
            SessionAssets::default(),
        )
        .unwrap()
    }

    fn backend(l: &FrameLoop<HeadlessBackend>) -> &HeadlessBackend {
        l.session().backend()
    }

    // ── ticks ────────────────────────────────────────────────────────────

    #[test]
    fn tick_draws_and_presents_once() {
        let mut l = frame_loop(FrameConfig::default());
        l.session_mut().backend_mut().clear_commands();
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));
        assert_eq!(l.state(), FrameState::Idle);
        assert_eq!(backend(&l).draw_calls().len(), 1);
        assert_eq!(backend(&l).presents(), 1);
        assert_eq!(l.stats().presented, 1);
    }

    #[test]
    fn bindings_precede_draw_precedes_present() {
        let mut l = frame_loop(FrameConfig::default());
        l.session_mut().backend_mut().clear_commands();
        l.tick().unwrap();
        let commands = backend(&l).commands();
        assert!(matches!(commands[0], Command::SetRenderTarget(_)));
        assert!(matches!(commands[1], Command::SetViewport(_)));
        assert!(matches!(commands[2], Command::SetShaders { .. }));
        assert!(matches!(commands[3], Command::SetInputLayout(_)));
        assert!(matches!(
            commands[4],
            Command::SetVertexBuffer {
                slot: 0,
                stride: 28,
                offset: 0,
                ..
            }
        ));
        assert_eq!(
            commands[5],
            Command::SetPrimitiveTopology(wgpu::PrimitiveTopology::TriangleList)
        );
        assert!(matches!(commands[6], Command::Draw(_)));
        assert_eq!(commands[7], Command::Present { sync_interval: 0 });
        assert_eq!(commands.len(), 8);
    }

    #[test]
    fn unsynchronized_loop_never_waits_for_vblank() {
        let mut l = frame_loop(FrameConfig::default());
        for _ in 0..10 {
            l.tick().unwrap();
        }
        assert_eq!(backend(&l).clock().vblanks(), 0);
        assert_eq!(backend(&l).clock().now(), Duration::ZERO);
    }

    #[test]
    fn synchronized_loop_waits_per_frame() {
        let mut l = frame_loop(FrameConfig {
            sync_interval: 1,
            ..FrameConfig::default()
        });
        for _ in 0..3 {
            l.tick().unwrap();
        }
        assert_eq!(backend(&l).clock().vblanks(), 3);
        assert!(backend(&l).clock().now() >= backend(&l).clock().refresh() * 3);
    }

    #[test]
    fn synchronized_present_waits_for_the_next_vblank_only() {
        let mut l = frame_loop(FrameConfig {
            sync_interval: 1,
            ..FrameConfig::default()
        });
        let refresh = backend(&l).clock().refresh();
        l.session_mut().backend_mut().clock_mut().advance(refresh / 2);
        l.tick().unwrap();
        assert_eq!(backend(&l).clock().now(), refresh);
        assert_eq!(backend(&l).clock().vblanks(), 1);
    }

    // ── resize ───────────────────────────────────────────────────────────

    #[test]
    fn zero_size_suspends_until_restored() {
        let mut l = frame_loop(FrameConfig::default());
        l.handle(HostEvent::Resize {
            width: 0,
            height: 0,
        })
        .unwrap();
        l.session_mut().backend_mut().clear_commands();
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Suspended));
        assert!(backend(&l).commands().is_empty());

        l.handle(HostEvent::Resize {
            width: 1024,
            height: 600,
        })
        .unwrap();
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));
        let desc = *l.session().surface().unwrap().desc();
        assert_eq!((desc.width, desc.height), (1024, 600));
    }

    #[test]
    fn resize_back_after_a_failed_resize_keeps_rendering() {
        let mut l = frame_loop(FrameConfig::default());
        l.session_mut().backend_mut().fail_at(FailPoint::ResizeBuffers);
        assert!(l.resize(800, 600).is_err());
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));

        l.session_mut().backend_mut().clear_failures();
        l.resize(1366, 768).unwrap();
        assert!(l.session().surface().unwrap().render_target().is_some());
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));

        l.resize(800, 600).unwrap();
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));
        let draw = *backend(&l).draw_calls().last().unwrap();
        assert_eq!(draw.viewport, Viewport::full(800, 600));
    }

    #[test]
    fn same_size_resize_keeps_the_view() {
        let mut l = frame_loop(FrameConfig::default());
        let before = l.session().surface().unwrap().render_target();
        l.resize(1366, 768).unwrap();
        assert_eq!(l.session().surface().unwrap().render_target(), before);
    }

    // ── device loss ──────────────────────────────────────────────────────

    #[test]
    fn device_loss_recreates_the_session() {
        let mut l = frame_loop(FrameConfig::default());
        l.session_mut().backend_mut().lose_device("TDR");
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Recovered));
        assert_eq!(l.stats().recoveries, 1);
        assert_eq!(backend(&l).devices_created(), 2);
        assert_eq!(backend(&l).live_of(ResourceKind::Device), 1);
        assert!(matches!(l.tick().unwrap(), FrameOutcome::Presented(_)));
    }

    #[test]
    fn failed_recovery_is_returned() {
        let mut l = frame_loop(FrameConfig::default());
        l.session_mut().backend_mut().lose_device("TDR");
        l.session_mut().backend_mut().fail_at(FailPoint::Adapter);
        assert!(matches!(l.tick(), Err(RenderError::DeviceCreation(_))));
        assert_eq!(l.state(), FrameState::Idle);
        assert_eq!(backend(&l).live_count(), 0);
    }

    // ── shutdown ─────────────────────────────────────────────────────────

    #[test]
    fn quit_tears_down_and_reports_code() {
        let mut l = frame_loop(FrameConfig::default());
        assert_eq!(
            l.handle(HostEvent::Quit { exit_code: 3 }).unwrap(),
            LoopControl::Exit(3)
        );
        assert_eq!(l.state(), FrameState::Shutdown);
        assert_eq!(backend(&l).live_count(), 0);
        assert_eq!(l.handle(HostEvent::Tick).unwrap(), LoopControl::Exit(3));
        assert!(matches!(
            l.tick(),
            Err(RenderError::Lifecycle(LifecycleError::ShutDown))
        ));
    }

    #[test]
    fn run_renders_between_events() {
        let mut l = frame_loop(FrameConfig::default());
        let mut events = VecDeque::from([
            HostEvent::Resize {
                width: 800,
                height: 600,
            },
            HostEvent::Quit { exit_code: 0 },
        ]);
        assert_eq!(l.run(&mut events).unwrap(), 0);
        assert_eq!(backend(&l).presents(), 0);
        assert!(events.is_empty());
        assert_eq!(backend(&l).stray_releases(), 0);
    }

    #[test]
    fn run_ticks_when_queue_is_empty() {
        struct QuitAfter(u32);
        impl EventSource for QuitAfter {
            fn poll_event(&mut self) -> Option<HostEvent> {
                if self.0 == 0 {
                    return Some(HostEvent::Quit { exit_code: 7 });
                }
                self.0 -= 1;
                None
            }
        }

        let mut l = frame_loop(FrameConfig::default());
        assert_eq!(l.run(&mut QuitAfter(5)).unwrap(), 7);
        assert_eq!(l.stats().presented, 5);
        assert_eq!(backend(&l).draw_calls().len(), 5);
    }
}
