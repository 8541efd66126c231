/// Double-buffered presentation pair
///
/// The back buffer is the render target. It only becomes presentable once
/// a flush that rendered into it has completed.

use crate::error::{Error, Result};
use crate::{driver_bail, driver_debug};
use super::buffer_manager::{BufferManager, BufferHandle, BufferRole};

/// Bytes per pixel of the 32-bit ARGB render target
pub const BYTES_PER_PIXEL: u32 = 4;

#[derive(Debug, Clone)]
pub struct FramebufferPair {
    front: BufferHandle,
    back: BufferHandle,
    width: u32,
    height: u32,
    pitch: u32,
    back_ready: bool,
}

impl FramebufferPair {
    /// Allocate both buffers. Either both exist afterwards or neither does.
    pub fn new(buffers: &mut BufferManager, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            driver_bail!("lima::FramebufferPair", Error::InvalidArgument(
                format!("Framebuffer size {}x{} is empty", width, height)));
        }
        let (pitch, size) = match width.checked_mul(BYTES_PER_PIXEL)
            .and_then(|pitch| pitch.checked_mul(height).map(|size| (pitch, size)))
        {
            Some((pitch, size)) => (pitch, size as usize),
            None => driver_bail!("lima::FramebufferPair", Error::InvalidArgument(
                format!("Framebuffer size {}x{} does not fit in 32 bits", width, height))),
        };

        let front = buffers.allocate(BufferRole::Framebuffer, size)?;
        let back = match buffers.allocate(BufferRole::Framebuffer, size) {
            Ok(handle) => handle,
            Err(err) => {
                buffers.free(front)?;
                return Err(err);
            }
        };

        Ok(Self { front, back, width, height, pitch, back_ready: false })
    }

    /// Presented buffer
    pub fn front(&self) -> BufferHandle { self.front }

    /// Render target
    pub fn back(&self) -> BufferHandle { self.back }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    /// Bytes per row
    pub fn pitch(&self) -> u32 { self.pitch }

    /// Whether the back buffer holds a completed frame
    pub fn back_ready(&self) -> bool { self.back_ready }

    /// Record that a flush into the back buffer completed
    pub fn mark_back_ready(&mut self) {
        self.back_ready = true;
    }

    /// Drop any completed-frame state of the back buffer
    pub fn invalidate_back(&mut self) {
        self.back_ready = false;
    }

    /// Exchange front and back
    ///
    /// Only valid once the back buffer holds a completed frame.
    pub fn swap(&mut self) -> Result<()> {
        if !self.back_ready {
            driver_bail!("lima::FramebufferPair", Error::InvalidState(
                "Swap without a completed frame in the back buffer".to_string()));
        }
        std::mem::swap(&mut self.front, &mut self.back);
        self.back_ready = false;
        driver_debug!("lima::FramebufferPair", "Presenting {:?}", self.front);
        Ok(())
    }
}

#[cfg(test)]
#[path = "framebuffer_tests.rs"]
mod tests;
