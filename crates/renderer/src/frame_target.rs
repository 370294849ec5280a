//! Offscreen geometry pass target.
//!
//! A [`FrameTarget`] owns N half-float color attachments, one 24-bit depth
//! attachment and the framebuffer that ties them together. All attachments
//! share one size.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --create--> Sized --clear--> Created --resize--> Sized
//!                             |                                   ^
//!                             +------------ resize ---------------+
//! ```
//!
//! Resizing tears everything down and recreates it with the remembered
//! attachment count. Same-size and zero-size resizes are ignored, so a
//! minimized window keeps its last target.

use prism_rhi::texture::{TextureData, TextureDescriptor, TextureFormat, TextureTarget};
use prism_rhi::{FramebufferHandle, GraphicsDevice, RhiError, RhiResult, TextureHandle};
use tracing::{debug, info};

/// Color attachment format.
pub const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16F;

/// Depth attachment format.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24;

/// Lifecycle state of a [`FrameTarget`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetState {
    /// Never created.
    #[default]
    Uninitialized,
    /// Released by [`FrameTarget::clear`]; the attachment count is kept.
    Created,
    /// Live at the given size.
    Sized { width: u32, height: u32 },
}

#[derive(Debug, Default)]
pub struct FrameTarget {
    state: TargetState,
    attachment_count: u32,
    framebuffer: FramebufferHandle,
    colors: Vec<TextureHandle>,
    depth: TextureHandle,
}

impl FrameTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the attachments and the framebuffer.
    ///
    /// Any previous resources are released first.
    ///
    /// # Errors
    ///
    /// - [`RhiError::TooManyAttachments`] if `attachment_count` exceeds the
    ///   device limit
    /// - [`RhiError::FramebufferIncomplete`] if the device rejects the
    ///   attachment set
    pub fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        attachment_count: u32,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        let max = device.limits().max_color_attachments;
        if attachment_count > max {
            return Err(RhiError::TooManyAttachments {
                requested: attachment_count,
                max,
            });
        }

        self.clear(device);
        self.attachment_count = attachment_count;

        let mut colors = Vec::with_capacity(attachment_count as usize);
        let result = allocate(device, &mut colors, attachment_count, width, height);
        let (depth, framebuffer) = match result {
            Ok(created) => created,
            Err(e) => {
                for texture in colors {
                    device.destroy_texture(texture);
                }
                return Err(e);
            }
        };

        self.colors = colors;
        self.depth = depth;
        self.framebuffer = framebuffer;
        self.state = TargetState::Sized { width, height };

        info!(
            "Created frame target: {} attachments, {}x{}",
            attachment_count, width, height
        );
        Ok(())
    }

    /// Recreates the target at a new size.
    ///
    /// Does nothing if the size is unchanged, either dimension is zero, or
    /// the target was never created.
    pub fn resize(
        &mut self,
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> RhiResult<()> {
        if width == 0 || height == 0 {
            debug!("Ignoring frame target resize to {}x{}", width, height);
            return Ok(());
        }
        match self.state {
            TargetState::Uninitialized => Ok(()),
            TargetState::Sized {
                width: current_width,
                height: current_height,
            } if current_width == width && current_height == height => Ok(()),
            _ => self.create(device, self.attachment_count, width, height),
        }
    }

    /// Releases every texture and the framebuffer. Safe to call repeatedly.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        if self.state == TargetState::Uninitialized {
            return;
        }
        for texture in self.colors.drain(..) {
            device.destroy_texture(texture);
        }
        device.destroy_texture(self.depth);
        device.destroy_framebuffer(self.framebuffer);
        self.depth = TextureHandle::NULL;
        self.framebuffer = FramebufferHandle::NULL;
        if matches!(self.state, TargetState::Sized { .. }) {
            debug!("Released frame target");
        }
        self.state = TargetState::Created;
    }

    /// Binds the framebuffer and sets the viewport to its size.
    pub fn bind(&self, device: &mut dyn GraphicsDevice) -> bool {
        match self.state {
            TargetState::Sized { width, height } => {
                device.bind_framebuffer(self.framebuffer);
                device.set_viewport(width, height);
                true
            }
            _ => false,
        }
    }

    /// Binds color attachments to units `0..N` and depth to unit `N`.
    pub fn bind_attachments(&self, device: &mut dyn GraphicsDevice) {
        for (unit, texture) in self.colors.iter().enumerate() {
            device.bind_texture(unit as u32, TextureTarget::Texture2D, *texture);
        }
        device.bind_texture(self.attachment_count, TextureTarget::Texture2D, self.depth);
    }

    #[inline]
    pub fn state(&self) -> TargetState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TargetState::Sized { .. })
    }

    /// Current size, or `None` unless live.
    pub fn size(&self) -> Option<(u32, u32)> {
        match self.state {
            TargetState::Sized { width, height } => Some((width, height)),
            _ => None,
        }
    }

    #[inline]
    pub fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    #[inline]
    pub fn framebuffer(&self) -> FramebufferHandle {
        self.framebuffer
    }

    #[inline]
    pub fn colors(&self) -> &[TextureHandle] {
        &self.colors
    }

    #[inline]
    pub fn depth(&self) -> TextureHandle {
        self.depth
    }
}

/// Creates the color textures (pushed into `colors` as they succeed), the
/// depth texture and the framebuffer.
fn allocate(
    device: &mut dyn GraphicsDevice,
    colors: &mut Vec<TextureHandle>,
    count: u32,
    width: u32,
    height: u32,
) -> RhiResult<(TextureHandle, FramebufferHandle)> {
    let color_desc = TextureDescriptor::attachment(width, height, COLOR_FORMAT);
    for _ in 0..count {
        colors.push(device.create_texture(&color_desc, TextureData::Empty)?);
    }

    let depth_desc = TextureDescriptor::attachment(width, height, DEPTH_FORMAT);
    let depth = device.create_texture(&depth_desc, TextureData::Empty)?;

    match device.create_framebuffer(colors, depth) {
        Ok(framebuffer) => Ok((depth, framebuffer)),
        Err(e) => {
            device.destroy_texture(depth);
            Err(e)
        }
    }
}
