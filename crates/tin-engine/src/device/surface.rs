use super::error::SurfaceErrorAction;

/// Prefers a linear 8-bit RGBA/BGRA format, matching what the shaders write.
pub(crate) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Option<wgpu::TextureFormat> {
    let preferred = [
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Bgra8Unorm,
    ];
    preferred
        .into_iter()
        .find(|f| formats.contains(f))
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        caps.alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto)
    }
}

/// `0` presents immediately, anything else waits for vertical blank.
///
/// wgpu cannot skip blanks, so intervals above 1 behave like 1.
pub(crate) fn present_mode_for(sync_interval: u32) -> wgpu::PresentMode {
    if sync_interval == 0 {
        wgpu::PresentMode::AutoNoVsync
    } else {
        wgpu::PresentMode::Fifo
    }
}

/// Whether a device with `device_features` can render `format` at
/// `sample_count` samples.
///
/// Adapter-specific counts only count when the device was created with
/// `TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES`. Without it wgpu validates
/// against the guaranteed counts (1 and 4).
pub(crate) fn sample_count_supported(
    format: wgpu::TextureFormat,
    device_features: wgpu::Features,
    adapter_features: wgpu::TextureFormatFeatures,
    sample_count: u32,
) -> bool {
    let features = if device_features
        .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
    {
        adapter_features
    } else {
        format.guaranteed_format_features(device_features)
    };
    features.flags.sample_count_supported(sample_count)
}

/// Offscreen color target the draws go to.
///
/// Multisampled targets are resolved into the surface image at present,
/// single-sampled ones are copied.
pub(crate) fn create_back_buffer(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    sample_count: u32,
) -> wgpu::Texture {
    let usage = if sample_count > 1 {
        wgpu::TextureUsages::RENDER_ATTACHMENT
    } else {
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
    };
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("tin back buffer"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

pub(crate) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    err: wgpu::SurfaceError,
) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            if config.width > 0 && config.height > 0 {
                surface.configure(device, config);
            }
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_linear_rgba() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        ];
        assert_eq!(
            choose_surface_format(&formats),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [wgpu::TextureFormat::Rgb10a2Unorm];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    fn adapter_with_x8() -> wgpu::TextureFormatFeatures {
        wgpu::TextureFormatFeatures {
            allowed_usages: wgpu::TextureUsages::RENDER_ATTACHMENT,
            flags: wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X4
                | wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X8
                | wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE,
        }
    }

    #[test]
    fn adapter_sample_counts_need_the_adapter_specific_feature() {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let plain = wgpu::Features::empty();
        assert!(sample_count_supported(format, plain, adapter_with_x8(), 1));
        assert!(sample_count_supported(format, plain, adapter_with_x8(), 4));
        assert!(!sample_count_supported(format, plain, adapter_with_x8(), 8));

        let specific = wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        assert!(sample_count_supported(format, specific, adapter_with_x8(), 8));
        assert!(!sample_count_supported(format, specific, adapter_with_x8(), 16));
    }

    #[test]
    fn sync_interval_selects_present_mode() {
        assert_eq!(present_mode_for(0), wgpu::PresentMode::AutoNoVsync);
        assert_eq!(present_mode_for(1), wgpu::PresentMode::Fifo);
        assert_eq!(present_mode_for(4), wgpu::PresentMode::Fifo);
    }
}
