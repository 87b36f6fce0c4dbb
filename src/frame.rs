// =============================================================================
// FRAME RENDERER - pre-recorded draw + acquire/submit/present loop
// =============================================================================
//
// FRAME FLOW:
// 1. Wait for the fence of the current frame slot (bounds frames in flight)
// 2. Acquire swapchain image          -> signals `image_acquired`
// 3. Submit that image's command buffer (waits `image_acquired`,
//    signals the image's `render_finished` + slot fence)
// 4. Present                          (waits `render_finished`)
// 5. Advance to the next slot
//
// =============================================================================

use ash::vk;
use std::sync::Arc;

use crate::backend::sync::{self, FrameRing, FrameSync, ImageFences};
use crate::backend::{pipeline, shader, LogicalDevice, Swapchain};
use crate::config::Config;
use crate::error::{FrameError, SetupContext, SetupError};

/// Where the current `draw_frame` call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Acquiring,
    Submitting,
    Presenting,
}

impl FramePhase {
    pub fn next(self) -> Self {
        match self {
            FramePhase::Idle => FramePhase::Acquiring,
            FramePhase::Acquiring => FramePhase::Submitting,
            FramePhase::Submitting => FramePhase::Presenting,
            FramePhase::Presenting => FramePhase::Idle,
        }
    }
}

/// Owns the fixed pipeline and every per-frame resource.
///
/// All handles start out null and are filled in step by step, so dropping a
/// half-built renderer releases exactly what was created.
pub struct FrameRenderer {
    device: Arc<LogicalDevice>,

    // ─────────────────────────────────────────────────────────────────────────
    // PIPELINE STATE
    // ─────────────────────────────────────────────────────────────────────────
    clear_color: vk::ClearColorValue,
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,

    // ─────────────────────────────────────────────────────────────────────────
    // COMMANDS
    // ─────────────────────────────────────────────────────────────────────────
    command_pool: vk::CommandPool,
    /// One command buffer per swapchain image, recorded once
    command_buffers: Vec<vk::CommandBuffer>,

    // ─────────────────────────────────────────────────────────────────────────
    // SYNCHRONIZATION
    // ─────────────────────────────────────────────────────────────────────────
    frame_sync: Vec<FrameSync>,
    ring: FrameRing,
    /// One per swapchain image, waited on by present
    render_finished: Vec<vk::Semaphore>,
    image_fences: ImageFences,
    wait_stages: [vk::PipelineStageFlags; 1],

    phase: FramePhase,
    reported_suboptimal: bool,
}

impl FrameRenderer {
    pub fn new(
        device: Arc<LogicalDevice>,
        swapchain: &mut Swapchain,
        config: &Config,
    ) -> Result<Self, SetupError> {
        let extent = swapchain.extent;
        let mut renderer = Self {
            device,
            clear_color: vk::ClearColorValue {
                float32: config.graphics.clear_color,
            },
            viewport: pipeline::viewport_for(extent),
            scissor: pipeline::scissor_for(extent),
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            frame_sync: Vec::new(),
            ring: FrameRing::new(config.frames_in_flight()),
            render_finished: Vec::new(),
            image_fences: ImageFences::new(swapchain.image_count()),
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            phase: FramePhase::Idle,
            reported_suboptimal: false,
        };

        renderer.create_command_buffers(swapchain.image_count())?;
        renderer.render_pass = pipeline::create_render_pass(&renderer.device, swapchain.format.format)?;
        pipeline::create_framebuffers(
            &renderer.device,
            swapchain,
            renderer.render_pass,
            &mut renderer.framebuffers,
        )?;
        renderer.create_pipeline(config)?;

        for _ in 0..renderer.ring.len() {
            let sync = FrameSync::new(&renderer.device)?;
            renderer.frame_sync.push(sync);
        }
        for _ in 0..swapchain.image_count() {
            let semaphore = sync::create_semaphore(&renderer.device)?;
            renderer.render_finished.push(semaphore);
        }

        renderer.record_command_buffers()?;

        log::info!(
            "Recorded {} command buffers, {} frames in flight",
            renderer.command_buffers.len(),
            renderer.ring.len()
        );

        Ok(renderer)
    }

    fn create_command_buffers(&mut self, count: usize) -> Result<(), SetupError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.device.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        self.command_pool = unsafe { self.device.device.create_command_pool(&pool_info, None) }
            .setup_context("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        self.command_buffers = unsafe { self.device.device.allocate_command_buffers(&alloc_info) }
            .setup_context("vkAllocateCommandBuffers")?;
        Ok(())
    }

    fn create_pipeline(&mut self, config: &Config) -> Result<(), SetupError> {
        let vert = shader::load_shader_module(&self.device, &config.shaders.vertex)?;
        let frag = match shader::load_shader_module(&self.device, &config.shaders.fragment) {
            Ok(frag) => frag,
            Err(e) => {
                unsafe { self.device.device.destroy_shader_module(vert, None) };
                return Err(e);
            }
        };

        let result = pipeline::create_pipeline_layout(&self.device).and_then(|layout| {
            self.pipeline_layout = layout;
            pipeline::create_graphics_pipeline(
                &self.device,
                self.render_pass,
                layout,
                self.viewport,
                self.scissor,
                vert,
                frag,
            )
        });

        // Modules are baked into the pipeline and not needed afterwards
        unsafe {
            self.device.device.destroy_shader_module(vert, None);
            self.device.device.destroy_shader_module(frag, None);
        }

        self.pipeline = result?;
        Ok(())
    }

    /// Record the single draw into every command buffer.
    ///
    /// Buffers are resubmitted as-is whenever their image comes around again.
    fn record_command_buffers(&self) -> Result<(), SetupError> {
        let device = &self.device.device;
        let clear_values = [vk::ClearValue {
            color: self.clear_color,
        }];

        for (&cmd, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(self.scissor)
                .clear_values(&clear_values);

            unsafe {
                device
                    .begin_command_buffer(cmd, &begin_info)
                    .setup_context("vkBeginCommandBuffer")?;

                device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
                device.cmd_draw(cmd, 3, 1, 0, 0);
                device.cmd_end_render_pass(cmd);

                device
                    .end_command_buffer(cmd)
                    .setup_context("vkEndCommandBuffer")?;
            }
        }

        Ok(())
    }

    /// Render a single frame. The phase is back to `Idle` on return, even on error.
    pub fn draw_frame(&mut self, swapchain: &Swapchain) -> Result<(), FrameError> {
        let result = self.run_frame(swapchain);
        if let Err(e) = &result {
            log::warn!("Frame aborted while {:?}: {}", self.phase, e);
        }
        self.phase = FramePhase::Idle;
        result
    }

    fn run_frame(&mut self, swapchain: &Swapchain) -> Result<(), FrameError> {
        let logical = Arc::clone(&self.device);
        let device = &logical.device;
        let slot = self.ring.current();
        let sync = self.frame_sync[slot];

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU is done with this slot, then acquire
        // ─────────────────────────────────────────────────────────────────────
        self.phase = self.phase.next();
        unsafe { device.wait_for_fences(&[sync.in_flight], true, u64::MAX) }
            .map_err(FrameError::Wait)?;

        let (image_index, suboptimal) = swapchain.acquire_next_image(sync.image_acquired)?;
        self.note_suboptimal(suboptimal);

        // An earlier slot may still be rendering into this image
        if let Some(image_fence) = self.image_fences.pending(image_index, sync.in_flight) {
            unsafe { device.wait_for_fences(&[image_fence], true, u64::MAX) }
                .map_err(FrameError::Wait)?;
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Submit the pre-recorded command buffer
        // ─────────────────────────────────────────────────────────────────────
        self.phase = self.phase.next();
        let wait_semaphores = [sync.image_acquired];
        let signal_semaphores = [self.render_finished[image_index as usize]];
        let command_buffers = [self.command_buffers[image_index as usize]];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let submitted = self.image_fences.submit(image_index, sync.in_flight, || unsafe {
            device
                .reset_fences(&[sync.in_flight])
                .map_err(FrameError::Wait)?;
            device
                .queue_submit(logical.queue, &[submit_info], sync.in_flight)
                .map_err(FrameError::Submit)
        });
        if let Err(e) = submitted {
            self.replace_slot(slot);
            return Err(e);
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Present
        // ─────────────────────────────────────────────────────────────────────
        self.phase = self.phase.next();
        let suboptimal = swapchain.present(image_index, &signal_semaphores)?;
        self.note_suboptimal(suboptimal);

        self.ring.advance();
        Ok(())
    }

    /// Swap in fresh sync objects for a slot whose fence was reset but never
    /// submitted, so the next wait on it can return.
    fn replace_slot(&mut self, slot: usize) {
        let fresh = match FrameSync::new(&self.device) {
            Ok(fresh) => fresh,
            Err(e) => {
                log::error!("Cannot recreate sync objects for frame slot {}: {}", slot, e);
                return;
            }
        };

        let _ = self.device.wait_idle();
        let stale = std::mem::replace(&mut self.frame_sync[slot], fresh);
        self.image_fences.forget(stale.in_flight);
        stale.destroy(&self.device.device);
    }

    fn note_suboptimal(&mut self, suboptimal: bool) {
        if suboptimal && !self.reported_suboptimal {
            log::warn!("Swapchain is suboptimal for the surface; continuing without recreation");
            self.reported_suboptimal = true;
        }
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();

        let device = &self.device.device;
        unsafe {
            for sync in &self.frame_sync {
                sync.destroy(device);
            }
            for &semaphore in &self.render_finished {
                device.destroy_semaphore(semaphore, None);
            }
            // Also frees the command buffers
            device.destroy_command_pool(self.command_pool, None);

            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_cycle_back_to_idle() {
        let mut phase = FramePhase::default();
        let mut seen = vec![phase];
        for _ in 0..4 {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            [
                FramePhase::Idle,
                FramePhase::Acquiring,
                FramePhase::Submitting,
                FramePhase::Presenting,
                FramePhase::Idle,
            ]
        );
    }
}
