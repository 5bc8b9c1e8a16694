//! Flags controlling how an image source is resolved into a native image.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GetImageFlags(u32);

impl GetImageFlags {
    pub const NONE: Self = Self(0);
    /// Resolve only as far as needed to obtain a handle; inputs of an
    /// already realized effect are not revisited and DPI compensation keeps
    /// its current state.
    pub const MINIMAL_REALIZATION: Self = Self(1 << 0);
    /// Missing sources are attached as null inputs instead of failing.
    pub const ALLOW_NULL_EFFECT_INPUTS: Self = Self(1 << 1);
    pub const NEVER_INSERT_DPI_COMPENSATION: Self = Self(1 << 2);
    pub const ALWAYS_INSERT_DPI_COMPENSATION: Self = Self(1 << 3);
    /// Take the target DPI from the device context instead of the request.
    pub const READ_DPI_FROM_DEVICE_CONTEXT: Self = Self(1 << 4);
    /// On a recoverable failure, unrealize and report no image instead of
    /// returning the error.
    pub const UNREALIZE_ON_FAILURE: Self = Self(1 << 5);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::MINIMAL_REALIZATION, "MINIMAL_REALIZATION"),
        (Self::ALLOW_NULL_EFFECT_INPUTS, "ALLOW_NULL_EFFECT_INPUTS"),
        (Self::NEVER_INSERT_DPI_COMPENSATION, "NEVER_INSERT_DPI_COMPENSATION"),
        (Self::ALWAYS_INSERT_DPI_COMPENSATION, "ALWAYS_INSERT_DPI_COMPENSATION"),
        (Self::READ_DPI_FROM_DEVICE_CONTEXT, "READ_DPI_FROM_DEVICE_CONTEXT"),
        (Self::UNREALIZE_ON_FAILURE, "UNREALIZE_ON_FAILURE"),
    ];

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for GetImageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for GetImageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for GetImageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("GetImageFlags(NONE)");
        }

        let names = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" | ");
        write!(f, "GetImageFlags({names})")
    }
}
