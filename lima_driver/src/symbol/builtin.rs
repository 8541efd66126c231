/// Built-in symbols the geometry processor reads regardless of shader content.
///
/// Nothing here is global: each linked program receives its own copies.

use glam::Vec4;
use crate::error::{Error, Result};
use crate::driver_bail;
use super::symbol::{Symbol, SymbolKind, StageFlags};

/// Viewport transform uniform name
pub const VIEWPORT_TRANSFORM: &str = "gl_mali_ViewportTransform";

/// First fixed constant block name
pub const MALIGP2_CONSTANT_000: &str = "__maligp2_constant_000";

/// Values of the first fixed constant block
static CONSTANT_000: [f32; 4] = [-1.0, -1.0, 0.0, 0.0];

/// Whether a name is reserved for a built-in symbol
pub fn is_builtin(name: &str) -> bool {
    name == VIEWPORT_TRANSFORM || name == MALIGP2_CONSTANT_000
}

// ===== VIEWPORT =====

/// Viewport bounds and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub depth_near: f32,
    pub depth_far: f32,
}

impl Viewport {
    /// Full-size viewport with the default [0, 1] depth range
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: width as f32,
            y1: height as f32,
            depth_near: 0.0,
            depth_far: 1.0,
        }
    }

    /// Viewport width in pixels
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Viewport height in pixels
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Reject inverted or non-finite bounds
    pub fn validate(&self) -> Result<()> {
        let values = [self.x0, self.y0, self.x1, self.y1, self.depth_near, self.depth_far];
        if values.iter().any(|v| !v.is_finite()) {
            driver_bail!("lima::Viewport", Error::InvalidArgument(
                format!("Viewport has non-finite bounds: {:?}", self)));
        }
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            driver_bail!("lima::Viewport", Error::InvalidArgument(
                format!("Viewport is empty or inverted: {:?}", self)));
        }
        Ok(())
    }
}

// ===== VIEWPORT TRANSFORM =====

/// Two-row transform from normalized device coordinates to window space
///
/// Row 0 scales, row 1 offsets. The fourth lane carries the far and near
/// depth values the rasterizer clamps against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale: Vec4,
    pub offset: Vec4,
}

impl ViewportTransform {
    pub fn from_viewport(viewport: &Viewport) -> Self {
        let Viewport { x0, y0, x1, y1, depth_near, depth_far } = *viewport;
        Self {
            scale: Vec4::new((x1 - x0) / 2.0, (y1 - y0) / 2.0, (depth_far - depth_near) / 2.0, depth_far),
            offset: Vec4::new((x0 + x1) / 2.0, (y0 + y1) / 2.0, (depth_near + depth_far) / 2.0, depth_near),
        }
    }

    /// Flatten to the 8 floats laid out in the uniform block
    pub fn to_array(&self) -> [f32; 8] {
        let mut values = [0.0f32; 8];
        values[..4].copy_from_slice(&self.scale.to_array());
        values[4..].copy_from_slice(&self.offset.to_array());
        values
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.to_array()).to_vec()
    }
}

// ===== SYMBOL CONSTRUCTORS =====

/// Viewport transform uniform (4 bytes x 4 entries x 2 rows), physical
pub fn viewport_transform_symbol(viewport: &Viewport) -> Result<Symbol<'static>> {
    viewport.validate()?;
    let bytes = ViewportTransform::from_viewport(viewport).to_bytes();
    Ok(Symbol::new(VIEWPORT_TRANSFORM, SymbolKind::Uniform, 4, 4, 2, Some(&bytes))?
        .with_physical(true)
        .with_stages(StageFlags::VERTEX))
}

/// Fixed constant block, borrowing static storage, physical
pub fn constant_000_symbol() -> Result<Symbol<'static>> {
    let bytes: &'static [u8] = bytemuck::cast_slice(&CONSTANT_000);
    Ok(Symbol::new_borrowed(MALIGP2_CONSTANT_000, SymbolKind::Uniform, 4, 4, 1, bytes)?
        .with_physical(true)
        .with_stages(StageFlags::VERTEX))
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
