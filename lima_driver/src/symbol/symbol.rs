/// Symbol - one named entity recovered from compiled shader metadata.
///
/// The kind is a tagged payload: uniforms and attributes carry a backing
/// region holding their current value, varyings carry nothing.
/// Backing data is either owned by the symbol or borrowed from the caller
/// for the lifetime `'a` of the table.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::driver_bail;

// ===== SYMBOL KIND =====

/// Kind of a shader symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Constant for a whole draw, written by `attach_uniform`
    Uniform,
    /// Per-vertex input, fed by `bind_attribute`
    Attribute,
    /// Vertex-to-fragment interpolated value
    Varying,
}

// ===== STAGE FLAGS =====

bitflags! {
    /// Shader stages that reference a symbol
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

// ===== BACKING DATA =====

/// Storage behind a uniform or attribute value
#[derive(Debug, Clone)]
pub enum SymbolData<'a> {
    /// Private copy owned by the symbol
    Owned(Vec<u8>),
    /// Caller buffer; the caller keeps it alive for the table's lifetime
    Borrowed(&'a [u8]),
}

impl<'a> SymbolData<'a> {
    /// Bytes of the current value
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SymbolData::Owned(bytes) => bytes,
            SymbolData::Borrowed(bytes) => bytes,
        }
    }

    /// Whether the symbol owns its storage
    pub fn is_owned(&self) -> bool {
        matches!(self, SymbolData::Owned(_))
    }

    /// Mutable access, copying borrowed storage into owned storage first
    pub fn to_mut(&mut self) -> &mut Vec<u8> {
        if let SymbolData::Borrowed(bytes) = *self {
            *self = SymbolData::Owned(bytes.to_vec());
        }
        match self {
            SymbolData::Owned(bytes) => bytes,
            SymbolData::Borrowed(_) => unreachable!("borrowed data promoted above"),
        }
    }
}

/// Backing region of a uniform or attribute
#[derive(Debug, Clone)]
pub struct Backing<'a> {
    data: SymbolData<'a>,
    physical: bool,
}

impl<'a> Backing<'a> {
    /// Current value storage
    pub fn data(&self) -> &SymbolData<'a> {
        &self.data
    }

    /// Whether the hardware needs a physical rather than virtual address
    pub fn is_physical(&self) -> bool {
        self.physical
    }
}

/// Kind-specific symbol payload
#[derive(Debug, Clone)]
pub enum SymbolPayload<'a> {
    Uniform(Backing<'a>),
    Attribute(Backing<'a>),
    Varying,
}

// ===== SYMBOL =====

/// A named uniform, attribute or varying
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    name: String,
    element_size: u32,
    element_entries: u32,
    element_count: u32,
    location: Option<u32>,
    address_hint: Option<u32>,
    stages: StageFlags,
    payload: SymbolPayload<'a>,
}

impl<'a> Symbol<'a> {
    /// Create a symbol owning a private copy of its value
    ///
    /// # Arguments
    ///
    /// * `element_size` - Bytes per scalar component
    /// * `element_entries` - Components per element (4 for vec4)
    /// * `element_count` - Array length (1 for non-arrays)
    /// * `data` - Initial value, exactly `footprint` bytes; `None` zero-initializes
    ///
    /// Varyings never carry backing data, `data` is ignored for them.
    pub fn new(
        name: &str,
        kind: SymbolKind,
        element_size: u32,
        element_entries: u32,
        element_count: u32,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        let footprint = Self::validate_shape(name, element_size, element_entries, element_count)?;
        let data = match data {
            Some(bytes) => {
                Self::validate_data(name, footprint, bytes)?;
                SymbolData::Owned(bytes.to_vec())
            }
            None => SymbolData::Owned(vec![0u8; footprint]),
        };
        Ok(Self::from_parts(name, kind, element_size, element_entries, element_count, data))
    }

    /// Create a symbol borrowing the caller's buffer as its value
    ///
    /// The buffer must outlive the table holding the symbol. The first
    /// write through the driver copies it into owned storage.
    pub fn new_borrowed(
        name: &str,
        kind: SymbolKind,
        element_size: u32,
        element_entries: u32,
        element_count: u32,
        data: &'a [u8],
    ) -> Result<Self> {
        let footprint = Self::validate_shape(name, element_size, element_entries, element_count)?;
        Self::validate_data(name, footprint, data)?;
        Ok(Self::from_parts(
            name, kind, element_size, element_entries, element_count,
            SymbolData::Borrowed(data),
        ))
    }

    fn validate_shape(name: &str, element_size: u32, element_entries: u32, element_count: u32) -> Result<usize> {
        if name.is_empty() {
            driver_bail!("lima::Symbol", Error::InvalidArgument("Symbol name is empty".to_string()));
        }
        if element_size == 0 || element_entries == 0 || element_count == 0 {
            driver_bail!("lima::Symbol", Error::ShapeMismatch(format!(
                "Symbol '{}' has an empty shape ({}x{}x{})",
                name, element_size, element_entries, element_count)));
        }
        match element_size.checked_mul(element_entries).and_then(|size| size.checked_mul(element_count)) {
            Some(footprint) => Ok(footprint as usize),
            None => driver_bail!("lima::Symbol", Error::ShapeMismatch(format!(
                "Symbol '{}' footprint {}x{}x{} exceeds 32 bits",
                name, element_size, element_entries, element_count))),
        }
    }

    fn validate_data(name: &str, footprint: usize, data: &[u8]) -> Result<()> {
        if data.len() != footprint {
            driver_bail!("lima::Symbol", Error::ShapeMismatch(format!(
                "Symbol '{}' expects {} bytes of data, got {}",
                name, footprint, data.len())));
        }
        Ok(())
    }

    fn from_parts(
        name: &str,
        kind: SymbolKind,
        element_size: u32,
        element_entries: u32,
        element_count: u32,
        data: SymbolData<'a>,
    ) -> Self {
        let payload = match kind {
            SymbolKind::Uniform => SymbolPayload::Uniform(Backing { data, physical: false }),
            SymbolKind::Attribute => SymbolPayload::Attribute(Backing { data, physical: false }),
            SymbolKind::Varying => SymbolPayload::Varying,
        };

        Self {
            name: name.to_string(),
            element_size,
            element_entries,
            element_count,
            location: None,
            address_hint: None,
            stages: StageFlags::empty(),
            payload,
        }
    }

    // ===== ACCESSORS =====

    /// Symbol name as referenced by the shaders
    pub fn name(&self) -> &str { &self.name }

    /// Symbol kind, derived from the payload tag
    pub fn kind(&self) -> SymbolKind {
        match self.payload {
            SymbolPayload::Uniform(_) => SymbolKind::Uniform,
            SymbolPayload::Attribute(_) => SymbolKind::Attribute,
            SymbolPayload::Varying => SymbolKind::Varying,
        }
    }

    /// Bytes per scalar component
    pub fn element_size(&self) -> u32 { self.element_size }

    /// Components per element
    pub fn element_entries(&self) -> u32 { self.element_entries }

    /// Array length
    pub fn element_count(&self) -> u32 { self.element_count }

    /// Exact byte footprint: size * entries * count
    ///
    /// Construction guarantees the product fits in 32 bits.
    pub fn footprint(&self) -> usize {
        self.element_size as usize * self.element_entries as usize * self.element_count as usize
    }

    /// Resolved location (uniform block offset or attribute/varying slot)
    pub fn location(&self) -> Option<u32> { self.location }

    /// Location suggested by the shader compiler
    pub fn address_hint(&self) -> Option<u32> { self.address_hint }

    /// Stages referencing this symbol
    pub fn stages(&self) -> StageFlags { self.stages }

    /// Kind-specific payload
    pub fn payload(&self) -> &SymbolPayload<'a> { &self.payload }

    /// Backing region (None for varyings)
    pub fn backing(&self) -> Option<&Backing<'a>> {
        match &self.payload {
            SymbolPayload::Uniform(backing) | SymbolPayload::Attribute(backing) => Some(backing),
            SymbolPayload::Varying => None,
        }
    }

    /// Current value bytes (None for varyings)
    pub fn data(&self) -> Option<&[u8]> {
        self.backing().map(|backing| backing.data.as_bytes())
    }

    /// Whether the location must be a physical address
    pub fn is_physical(&self) -> bool {
        self.backing().map(|backing| backing.physical).unwrap_or(false)
    }

    /// Whether two symbols have exactly the same shape
    pub fn same_footprint(&self, other: &Symbol<'_>) -> bool {
        self.element_size == other.element_size
            && self.element_entries == other.element_entries
            && self.element_count == other.element_count
    }

    // ===== MUTATION =====

    /// Overwrite part of the backing region
    ///
    /// Borrowed storage is copied into owned storage before the write.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let footprint = self.footprint();
        let name = self.name.clone();
        let backing = match &mut self.payload {
            SymbolPayload::Uniform(backing) | SymbolPayload::Attribute(backing) => backing,
            SymbolPayload::Varying => {
                driver_bail!("lima::Symbol", Error::KindMismatch {
                    name,
                    expected: SymbolKind::Uniform,
                    found: SymbolKind::Varying,
                });
            }
        };
        if offset + bytes.len() > footprint {
            driver_bail!("lima::Symbol", Error::ShapeMismatch(format!(
                "Write of {} bytes at offset {} exceeds footprint {} of '{}'",
                bytes.len(), offset, footprint, name)));
        }
        backing.data.to_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Builder: mark the backing as requiring a physical address
    pub fn with_physical(mut self, physical: bool) -> Self {
        if let SymbolPayload::Uniform(backing) | SymbolPayload::Attribute(backing) = &mut self.payload {
            backing.physical = physical;
        }
        self
    }

    /// Builder: set the compiler address hint
    pub fn with_address_hint(mut self, hint: Option<u32>) -> Self {
        self.address_hint = hint;
        self
    }

    /// Builder: set the referencing stages
    pub fn with_stages(mut self, stages: StageFlags) -> Self {
        self.stages = stages;
        self
    }

    pub(crate) fn add_stages(&mut self, stages: StageFlags) {
        self.stages |= stages;
    }

    pub(crate) fn set_location(&mut self, location: Option<u32>) {
        self.location = location;
    }

    pub(crate) fn set_physical(&mut self, physical: bool) {
        if let SymbolPayload::Uniform(backing) | SymbolPayload::Attribute(backing) = &mut self.payload {
            backing.physical = physical;
        }
    }
}

#[cfg(test)]
#[path = "symbol_tests.rs"]
mod tests;
