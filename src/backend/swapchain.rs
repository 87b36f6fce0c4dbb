// Swapchain - Window presentation
//
// Negotiation against the cached surface snapshot is kept free of Vulkan
// calls (`SwapchainPlan::negotiate`), then `Swapchain::new` turns the plan
// into a real swapchain through the logical device.

use ash::vk;
use std::sync::Arc;

use super::surface::SurfaceInfo;
use super::{LogicalDevice, PhysicalDevice, Surface};
use crate::config::PresentMode;
use crate::error::{FrameError, SetupError};

/// Backbuffer count requested from the driver.
pub const SWAPCHAIN_IMAGE_COUNT: u32 = 2;

/// Used when the surface accepts any format, and preferred otherwise.
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapchainConfig {
    pub present_mode: PresentMode,
}

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    Exclusive,
    /// Graphics family first, presentation family second.
    Concurrent([u32; 2]),
}

impl Sharing {
    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Sharing::Exclusive => vk::SharingMode::EXCLUSIVE,
            Sharing::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Sharing::Exclusive => &[],
            Sharing::Concurrent(indices) => indices,
        }
    }
}

/// Everything needed to fill `VkSwapchainCreateInfoKHR`.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub sharing: Sharing,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl SwapchainPlan {
    pub fn negotiate(
        surface: &SurfaceInfo,
        graphics_family: u32,
        config: &SwapchainConfig,
    ) -> Result<Self, SetupError> {
        if !surface.can_present {
            return Err(SetupError::CannotPresent(graphics_family));
        }

        let caps = &surface.capabilities;
        let image_count = choose_image_count(SWAPCHAIN_IMAGE_COUNT, caps)?;
        let format = choose_surface_format(&surface.formats)?;

        // currentExtent may be the 0xFFFFFFFF "window decides" sentinel; not handled.
        let extent = caps.current_extent;

        let present_family =
            choose_present_family(surface.can_present, graphics_family, surface.present_family);
        let sharing = choose_sharing(graphics_family, present_family);
        let transform = choose_transform(caps);

        let present_mode = config.present_mode.to_vk();
        if !surface.present_modes.contains(&present_mode) {
            return Err(SetupError::PresentModeUnsupported(present_mode));
        }

        Ok(Self {
            image_count,
            format,
            extent,
            sharing,
            transform,
            present_mode,
        })
    }
}

/// The request must stay strictly below `max_image_count` (0 means unbounded).
pub fn choose_image_count(
    requested: u32,
    caps: &vk::SurfaceCapabilitiesKHR,
) -> Result<u32, SetupError> {
    if caps.max_image_count != 0 && requested >= caps.max_image_count {
        return Err(SetupError::ImageCountExceeded {
            requested,
            max: caps.max_image_count,
        });
    }

    if requested < caps.min_image_count {
        log::warn!(
            "Surface needs at least {} images, requesting that instead of {}",
            caps.min_image_count,
            requested
        );
        return Ok(caps.min_image_count);
    }

    Ok(requested)
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SetupError> {
    match formats {
        [] => Err(SetupError::NoSurfaceFormats),
        [only] if only.format == vk::Format::UNDEFINED => Ok(DEFAULT_SURFACE_FORMAT),
        [first, ..] => Ok(formats
            .iter()
            .copied()
            .find(|f| {
                f.format == DEFAULT_SURFACE_FORMAT.format
                    && f.color_space == DEFAULT_SURFACE_FORMAT.color_space
            })
            .unwrap_or(*first)),
    }
}

/// The graphics family presents whenever it can; another family is only
/// used when it cannot.
pub fn choose_present_family(
    can_present: bool,
    graphics_family: u32,
    first_present_family: Option<u32>,
) -> u32 {
    if can_present {
        graphics_family
    } else {
        first_present_family.unwrap_or(graphics_family)
    }
}

pub fn choose_sharing(graphics_family: u32, present_family: u32) -> Sharing {
    if graphics_family != present_family {
        Sharing::Concurrent([graphics_family, present_family])
    } else {
        Sharing::Exclusive
    }
}

/// Identity when supported, otherwise the current transform.
pub fn choose_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    /// Parallel to `images`; null until the framebuffer step creates them.
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    device: Arc<LogicalDevice>,
}

impl Swapchain {
    pub fn new(
        device: Arc<LogicalDevice>,
        physical: &PhysicalDevice,
        surface: &Surface,
        config: &SwapchainConfig,
    ) -> Result<Self, SetupError> {
        let plan = SwapchainPlan::negotiate(surface.info(), physical.queue_family_index, config)?;

        log::info!(
            "Creating swapchain: {}x{} {:?}/{:?}",
            plan.extent.width,
            plan.extent.height,
            plan.format.format,
            plan.format.color_space
        );
        log::info!(
            "Present mode: {:?}, sharing: {:?}, transform: {:?}",
            plan.present_mode,
            plan.sharing,
            plan.transform
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle)
            .min_image_count(plan.image_count)
            .image_format(plan.format.format)
            .image_color_space(plan.format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing.mode())
            .queue_family_indices(plan.sharing.queue_family_indices())
            .pre_transform(plan.transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true);

        let handle = device.create_swapchain(&create_info)?;

        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                device.destroy_swapchain(handle);
                return Err(e);
            }
        };

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            handle,
            image_views: vec![vk::ImageView::null(); images.len()],
            images,
            format: plan.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
            device,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire next image for rendering, signalling `semaphore` when it is ready.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), FrameError> {
        self.device
            .acquire_next_image(self.handle, semaphore)
            .map_err(FrameError::from_acquire)
    }

    /// Present rendered image to screen. Returns the suboptimal flag.
    pub fn present(
        &self,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<bool, FrameError> {
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        self.device
            .queue_present(&present_info)
            .map_err(FrameError::from_present)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                if view != vk::ImageView::null() {
                    self.device.device.destroy_image_view(view, None);
                }
            }
        }
        self.device.destroy_swapchain(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: 800, height: 600 },
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn surface_info() -> SurfaceInfo {
        SurfaceInfo {
            can_present: true,
            present_family: Some(0),
            formats: vec![DEFAULT_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
            capabilities: caps(1, 3),
        }
    }

    fn assert_format(actual: vk::SurfaceFormatKHR, expected: vk::SurfaceFormatKHR) {
        assert_eq!(actual.format, expected.format);
        assert_eq!(actual.color_space, expected.color_space);
    }

    #[test]
    fn undefined_single_format_means_default() {
        for color_space in [
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ] {
            let formats = [format(vk::Format::UNDEFINED, color_space)];
            assert_format(choose_surface_format(&formats).unwrap(), DEFAULT_SURFACE_FORMAT);
        }
    }

    #[test]
    fn preferred_format_wins_over_first() {
        let formats = [
            format(vk::Format::R8G8B8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_format(choose_surface_format(&formats).unwrap(), formats[1]);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            // right format, wrong color space
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_format(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn undefined_among_several_is_not_special() {
        let formats = [
            format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_format(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(SetupError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn image_count_must_stay_below_max() {
        assert_eq!(choose_image_count(2, &caps(1, 3)).unwrap(), 2);
        assert!(matches!(
            choose_image_count(2, &caps(1, 2)),
            Err(SetupError::ImageCountExceeded { requested: 2, max: 2 })
        ));
    }

    #[test]
    fn unbounded_max_accepts_request() {
        assert_eq!(choose_image_count(2, &caps(1, 0)).unwrap(), 2);
    }

    #[test]
    fn image_count_raised_to_min() {
        assert_eq!(choose_image_count(2, &caps(3, 0)).unwrap(), 3);
    }

    #[test]
    fn identity_transform_preferred() {
        let mut c = caps(1, 3);
        c.supported_transforms =
            vk::SurfaceTransformFlagsKHR::IDENTITY | vk::SurfaceTransformFlagsKHR::ROTATE_90;
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_transform(&c), vk::SurfaceTransformFlagsKHR::IDENTITY);
    }

    #[test]
    fn current_transform_without_identity() {
        let mut c = caps(1, 3);
        c.supported_transforms =
            vk::SurfaceTransformFlagsKHR::ROTATE_90 | vk::SurfaceTransformFlagsKHR::ROTATE_270;
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_270;
        assert_eq!(choose_transform(&c), vk::SurfaceTransformFlagsKHR::ROTATE_270);
    }

    #[test]
    fn sharing_is_concurrent_only_across_families() {
        assert_eq!(choose_sharing(0, 0), Sharing::Exclusive);
        assert_eq!(choose_sharing(0, 2), Sharing::Concurrent([0, 2]));

        assert_eq!(Sharing::Exclusive.mode(), vk::SharingMode::EXCLUSIVE);
        assert!(Sharing::Exclusive.queue_family_indices().is_empty());
        assert_eq!(Sharing::Concurrent([1, 3]).mode(), vk::SharingMode::CONCURRENT);
        assert_eq!(Sharing::Concurrent([1, 3]).queue_family_indices(), &[1, 3]);
    }

    #[test]
    fn negotiate_full_plan() {
        let config = SwapchainConfig {
            present_mode: PresentMode::Immediate,
        };
        let plan = SwapchainPlan::negotiate(&surface_info(), 0, &config).unwrap();
        assert_eq!(plan.image_count, 2);
        assert_format(plan.format, DEFAULT_SURFACE_FORMAT);
        assert_eq!(plan.extent.width, 800);
        assert_eq!(plan.extent.height, 600);
        assert_eq!(plan.sharing, Sharing::Exclusive);
        assert_eq!(plan.transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn negotiate_presents_on_graphics_family_when_it_can() {
        let mut info = surface_info();
        info.present_family = Some(0);
        let plan = SwapchainPlan::negotiate(&info, 1, &SwapchainConfig::default()).unwrap();
        assert_eq!(plan.sharing, Sharing::Exclusive);
    }

    #[test]
    fn present_family_falls_back_only_without_graphics_support() {
        assert_eq!(choose_present_family(true, 2, Some(0)), 2);
        assert_eq!(choose_present_family(false, 2, Some(0)), 0);
        assert_eq!(choose_present_family(false, 2, None), 2);
    }

    #[test]
    fn negotiate_rejects_surface_that_cannot_present() {
        let mut info = surface_info();
        info.can_present = false;
        assert!(matches!(
            SwapchainPlan::negotiate(&info, 4, &SwapchainConfig::default()),
            Err(SetupError::CannotPresent(4))
        ));
    }

    #[test]
    fn negotiate_rejects_unlisted_present_mode() {
        let mut info = surface_info();
        info.present_modes = vec![vk::PresentModeKHR::FIFO];
        let config = SwapchainConfig {
            present_mode: PresentMode::Immediate,
        };
        assert!(matches!(
            SwapchainPlan::negotiate(&info, 0, &config),
            Err(SetupError::PresentModeUnsupported(vk::PresentModeKHR::IMMEDIATE))
        ));
    }

    #[test]
    fn negotiate_checks_image_count_before_formats() {
        let mut info = surface_info();
        info.capabilities = caps(1, 2);
        info.formats.clear();
        assert!(matches!(
            SwapchainPlan::negotiate(&info, 0, &SwapchainConfig::default()),
            Err(SetupError::ImageCountExceeded { .. })
        ));
    }
}
