use std::collections::VecDeque;

/// What the host windowing layer reports to the frame loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Nothing pending; time to render.
    Tick,
    /// New client area in physical pixels. Zero means minimized.
    Resize { width: u32, height: u32 },
    Quit { exit_code: i32 },
}

/// Directive returned after handling an event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    Exit(i32),
}

/// Non-blocking event queue the frame loop polls between frames.
pub trait EventSource {
    /// Next pending event, or `None` when the loop should render.
    fn poll_event(&mut self) -> Option<HostEvent>;
}

impl EventSource for VecDeque<HostEvent> {
    fn poll_event(&mut self) -> Option<HostEvent> {
        self.pop_front()
    }
}
