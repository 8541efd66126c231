/// Binder - resolves user-supplied names against a linked program
///
/// Attributes get a Vertex-role buffer holding the caller's data. Uniforms
/// are written into the symbol's backing region, converted to the declared
/// element size. Last write wins for both.

use half::f16;
use crate::error::{Error, Result};
use crate::{driver_bail, driver_trace};
use crate::memory::{BufferManager, BufferRole};
use crate::program::{AttributeBinding, Program};
use crate::symbol::{Symbol, SymbolKind, is_builtin};
use super::attribute::AttributeType;

fn require_kind(symbol: &Symbol<'_>, expected: SymbolKind) -> Result<()> {
    if symbol.kind() != expected {
        driver_bail!("lima::Binder", Error::KindMismatch {
            name: symbol.name().to_string(),
            expected,
            found: symbol.kind(),
        });
    }
    Ok(())
}

/// Complete vertices in `total` elements with `components` read every `stride`
pub fn vertex_count(total: u32, components: u32, stride: u32) -> u32 {
    if total < components {
        0
    } else {
        (total - components) / stride + 1
    }
}

/// Bind a vertex stream to an attribute
///
/// # Arguments
///
/// * `component_count` - Components read per vertex (1..=4)
/// * `stride` - Elements between consecutive vertices, 0 for tightly packed.
///   Interleaved layouts pass a stride larger than `component_count`.
/// * `source` - Raw stream bytes, copied into GPU-visible memory
pub fn bind_attribute(
    program: &mut Program,
    buffers: &mut BufferManager,
    name: &str,
    element_type: AttributeType,
    component_count: u32,
    stride: u32,
    source: &[u8],
) -> Result<()> {
    program.require_linked()?;
    require_kind(program.symbols().lookup(name)?, SymbolKind::Attribute)?;

    if !(1..=4).contains(&component_count) {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Attribute '{}' needs 1 to 4 components, got {}", name, component_count)));
    }
    let stride = if stride == 0 { component_count } else { stride };
    if stride < component_count {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Attribute '{}' stride {} is smaller than its {} components", name, stride, component_count)));
    }
    let element_size = element_type.size_bytes();
    if source.len() % element_size as usize != 0 {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Attribute '{}' source of {} bytes is not a whole number of {:?} elements",
            name, source.len(), element_type)));
    }
    let count = vertex_count((source.len() / element_size as usize) as u32, component_count, stride);
    if count == 0 {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Attribute '{}' source holds no complete vertex", name)));
    }

    let previous = program.attribute_binding(name).map(|binding| binding.buffer);
    let reusable = previous.filter(|&handle| {
        buffers.is_valid(handle)
            && buffers.pin_count(handle) == 0
            && buffers.size(handle).map(|size| size >= source.len()).unwrap_or(false)
    });

    let buffer = match reusable {
        Some(handle) => {
            buffers.write(handle, 0, source)?;
            handle
        }
        None => {
            let handle = buffers.allocate(BufferRole::Vertex, source.len())?;
            if let Err(err) = buffers.write(handle, 0, source) {
                buffers.free(handle)?;
                return Err(err);
            }
            if let Some(old) = previous {
                if buffers.is_valid(old) {
                    buffers.free(old)?;
                }
            }
            handle
        }
    };

    driver_trace!("lima::Binder", "Bound '{}': {} vertices of {}x{:?}, stride {}",
        name, count, component_count, element_type, stride);

    program.set_attribute_binding(name, AttributeBinding {
        buffer,
        element_type,
        components: component_count,
        stride: stride * element_size,
        vertex_count: count,
    });
    Ok(())
}

/// Convert f32 values to the symbol's element size
fn convert(name: &str, element_size: u32, data: &[f32]) -> Result<Vec<u8>> {
    match element_size {
        4 => Ok(bytemuck::cast_slice(data).to_vec()),
        2 => Ok(data.iter()
            .flat_map(|&value| f16::from_f32(value).to_bits().to_ne_bytes())
            .collect()),
        other => driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Uniform '{}' has unsupported element size {}", name, other))),
    }
}

/// Write uniform values into the program's symbol table
///
/// `data` holds `entries` floats per element, for at most `element_count`
/// elements. Elements past `data` keep their previous value.
pub fn attach_uniform(program: &mut Program, name: &str, entries: u32, data: &[f32]) -> Result<()> {
    program.require_linked()?;
    if is_builtin(name) {
        driver_bail!("lima::Binder", Error::InvalidArgument(format!(
            "Uniform '{}' is managed by the driver", name)));
    }

    let symbol = program.symbols_mut().lookup_mut(name)?;
    require_kind(symbol, SymbolKind::Uniform)?;

    if entries != symbol.element_entries() {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Uniform '{}' has {} entries, got {}", name, symbol.element_entries(), entries)));
    }
    let elements = if entries == 0 { 0 } else { data.len() / entries as usize };
    if data.is_empty() || data.len() % entries as usize != 0 || elements > symbol.element_count() as usize {
        driver_bail!("lima::Binder", Error::ShapeMismatch(format!(
            "Uniform '{}' takes up to {} elements of {} entries, got {} values",
            name, symbol.element_count(), entries, data.len())));
    }

    let bytes = convert(name, symbol.element_size(), data)?;
    symbol.write(0, &bytes)
}

#[cfg(test)]
#[path = "binder_tests.rs"]
mod tests;
