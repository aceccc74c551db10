//! Rendering session and the frame loop that drives it.
//!
//! The session owns every GPU object and enforces creation order; the frame
//! loop turns host events into frames and handles resize, device loss and
//! shutdown.

mod event;
mod frame_loop;
mod session;

pub use event::{EventSource, HostEvent, LoopControl};
pub use frame_loop::{FrameConfig, FrameLoop, FrameOutcome, FrameState, FrameStats};
pub use session::{RenderingSession, SessionAssets};
