// Error types
//
// Setup failures abort initialization as a whole. Frame failures are
// reported per call so the host decides whether to keep going.

use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while bringing the device up.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        #[source]
        result: vk::Result,
    },

    #[error("application name contains an interior NUL byte")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("no GPU exposes a graphics-capable queue family (checked {0} devices)")]
    NoSuitableDevice(usize),

    #[error("surface cannot present from queue family {0}")]
    CannotPresent(u32),

    #[error("requested {requested} swapchain images but the surface allows fewer than {max}")]
    ImageCountExceeded { requested: u32, max: u32 },

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("present mode {0:?} is not supported by the surface")]
    PresentModeUnsupported(vk::PresentModeKHR),

    #[error("failed to read shader {path:?}")]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is not a SPIR-V module")]
    InvalidSpirv { path: PathBuf },
}

/// Attach the name of the failing Vulkan call to a raw result.
pub trait SetupContext<T> {
    fn setup_context(self, call: &'static str) -> Result<T, SetupError>;
}

impl<T> SetupContext<T> for VkResult<T> {
    fn setup_context(self, call: &'static str) -> Result<T, SetupError> {
        self.map_err(|result| SetupError::Vulkan { call, result })
    }
}

/// Errors raised by a single `draw_frame` call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The surface changed under the swapchain. Recreating it is the only way out.
    #[error("swapchain is out of date")]
    SwapchainOutOfDate,

    #[error("waiting on the frame fence failed: {0}")]
    Wait(#[source] vk::Result),

    #[error("acquiring the next swapchain image failed: {0}")]
    Acquire(#[source] vk::Result),

    #[error("queue submission failed: {0}")]
    Submit(#[source] vk::Result),

    #[error("presentation failed: {0}")]
    Present(#[source] vk::Result),
}

impl FrameError {
    pub fn from_acquire(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SwapchainOutOfDate,
            other => Self::Acquire(other),
        }
    }

    pub fn from_present(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SwapchainOutOfDate,
            other => Self::Present(other),
        }
    }

    pub fn is_out_of_date(&self) -> bool {
        matches!(self, Self::SwapchainOutOfDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_date_is_classified_separately() {
        let acquire = FrameError::from_acquire(vk::Result::ERROR_OUT_OF_DATE_KHR);
        let present = FrameError::from_present(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert!(acquire.is_out_of_date());
        assert!(present.is_out_of_date());
    }

    #[test]
    fn other_results_keep_their_stage() {
        let lost = vk::Result::ERROR_DEVICE_LOST;
        assert_eq!(FrameError::from_acquire(lost), FrameError::Acquire(lost));
        assert_eq!(FrameError::from_present(lost), FrameError::Present(lost));
        assert!(!FrameError::Submit(lost).is_out_of_date());
    }

    #[test]
    fn setup_context_names_the_call() {
        let result: VkResult<()> = Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        let err = result.setup_context("vkCreateDevice").unwrap_err();
        match err {
            SetupError::Vulkan { call, result } => {
                assert_eq!(call, "vkCreateDevice");
                assert_eq!(result, vk::Result::ERROR_INITIALIZATION_FAILED);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
