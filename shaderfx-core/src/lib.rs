//! Backend-independent vocabulary shared by the `shaderfx` engine and its
//! device backends: resolution flags, the DPI compensation policy, geometry
//! and effect type identities.

pub mod dpi;
pub mod flags;
pub mod geometry;

use std::fmt;

pub use dpi::{DEFAULT_DPI, compensation_needed};
pub use flags::GetImageFlags;
pub use geometry::{Rect, Transform2D};

/// Stable identity of an effect type, equivalent to a COM CLSID.
///
/// The value is used by device backends to look up the native factory that
/// was registered for the effect type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectTypeId(u128);

impl EffectTypeId {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for EffectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectTypeId({self})")
    }
}

impl fmt::Display for EffectTypeId {
    /// Formats the id in registry GUID form, e.g. `6C26C5C7-34E0-46FC-9CFD-E5823706E215`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

/// Precision of the intermediate buffers an effect renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferPrecision {
    UNorm8,
    UNorm8Srgb,
    UNorm16,
    Float16,
    Float32,
}

impl BufferPrecision {
    /// Native enumeration value, where `0` is reserved for "unknown".
    pub const fn to_raw(self) -> u32 {
        match self {
            BufferPrecision::UNorm8 => 1,
            BufferPrecision::UNorm8Srgb => 2,
            BufferPrecision::UNorm16 => 3,
            BufferPrecision::Float16 => 4,
            BufferPrecision::Float32 => 5,
        }
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(BufferPrecision::UNorm8),
            2 => Some(BufferPrecision::UNorm8Srgb),
            3 => Some(BufferPrecision::UNorm16),
            4 => Some(BufferPrecision::Float16),
            5 => Some(BufferPrecision::Float32),
            _ => None,
        }
    }
}

/// How much of a composite effect's graph has to be redone on the next draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationType {
    /// The node wiring changed: discard the graph and build it again.
    Creation,
    /// Only node parameters changed: configure the existing graph.
    Update,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_id_formats_as_guid() {
        let id = EffectTypeId::from_u128(0x6c26c5c7_34e0_46fc_9cfd_e5823706e215);
        assert_eq!(id.to_string(), "6C26C5C7-34E0-46FC-9CFD-E5823706E215");
    }

    #[test]
    fn precision_raw_values() {
        for precision in [
            BufferPrecision::UNorm8,
            BufferPrecision::UNorm8Srgb,
            BufferPrecision::UNorm16,
            BufferPrecision::Float16,
            BufferPrecision::Float32,
        ] {
            assert_eq!(BufferPrecision::from_raw(precision.to_raw()), Some(precision));
        }
        assert_eq!(BufferPrecision::from_raw(0), None);
    }
}
