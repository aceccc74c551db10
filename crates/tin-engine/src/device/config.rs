use super::error::DeviceCreationError;

/// Device and swap-chain parameters.
///
/// Keep this structure stable and minimal; it replaces the fixed resolution
/// constants a bootstrap would otherwise hard-code.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Back-buffer width in physical pixels.
    pub width: u32,

    /// Back-buffer height in physical pixels.
    pub height: u32,

    /// Multisample count of the back buffer. Must be a power of two.
    ///
    /// An unsupported count fails device creation; there is no fallback to a
    /// lower count.
    pub sample_count: u32,

    /// Windowed (`true`) or full-screen (`false`) presentation.
    pub windowed: bool,

    /// Adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Desired maximum frame latency for the surface.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
            sample_count: 4,
            windowed: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            desired_maximum_frame_latency: 2,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), DeviceCreationError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceCreationError::InvalidConfig(format!(
                "surface size {}x{} has no area",
                self.width, self.height
            )));
        }
        if !self.sample_count.is_power_of_two() {
            return Err(DeviceCreationError::InvalidConfig(format!(
                "sample count {} is not a power of two",
                self.sample_count
            )));
        }
        Ok(())
    }
}
