/// Vertex attribute element types

/// Scalar type of an attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    Int32,
    UInt32,
    Int16,
    UInt16,
    Int8,
    UInt8,
}

impl AttributeType {
    /// Size of one component in bytes
    pub fn size_bytes(&self) -> u32 {
        match self {
            AttributeType::Float | AttributeType::Int32 | AttributeType::UInt32 => 4,
            AttributeType::Int16 | AttributeType::UInt16 => 2,
            AttributeType::Int8 | AttributeType::UInt8 => 1,
        }
    }

    /// Map a GLES type enum (GL_BYTE .. GL_FLOAT)
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            0x1400 => Some(AttributeType::Int8),
            0x1401 => Some(AttributeType::UInt8),
            0x1402 => Some(AttributeType::Int16),
            0x1403 => Some(AttributeType::UInt16),
            0x1404 => Some(AttributeType::Int32),
            0x1405 => Some(AttributeType::UInt32),
            0x1406 => Some(AttributeType::Float),
            _ => None,
        }
    }
}
