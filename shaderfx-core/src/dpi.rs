//! DPI compensation policy.
//!
//! When an input image was realized at a DPI different from the one its
//! consumer renders at, a compensation node is interposed between the two.
//! The functions here only decide; creating and wiring the node is up to
//! the caller.

use crate::GetImageFlags;

/// DPI assumed when nothing else specifies one.
pub const DEFAULT_DPI: f32 = 96.0;

/// Property indices of the built-in DPI compensation effect.
pub const DPI_COMPENSATION_PROP_INTERPOLATION_MODE: u32 = 0;
pub const DPI_COMPENSATION_PROP_BORDER_MODE: u32 = 1;
pub const DPI_COMPENSATION_PROP_INPUT_DPI: u32 = 2;

/// Interpolation used by the compensation node when scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    NearestNeighbor = 0,
    Linear = 1,
    Cubic = 2,
}

/// Edge behaviour of the compensation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Soft = 0,
    Hard = 1,
}

/// Interpolation every compensation node is configured with.
pub const COMPENSATION_INTERPOLATION: InterpolationMode = InterpolationMode::Linear;
/// Border mode every compensation node is configured with.
pub const COMPENSATION_BORDER: BorderMode = BorderMode::Hard;

/// Decides whether an input needs a DPI compensation node.
///
/// `input_dpi == 0.0` means the input has no fixed DPI and never needs one.
/// Under [`GetImageFlags::MINIMAL_REALIZATION`] the target DPI is not known
/// yet, so the current decision is kept.
pub fn compensation_needed(
    flags: GetImageFlags,
    has_compensation: bool,
    input_dpi: f32,
    target_dpi: f32,
) -> bool {
    if flags.contains(GetImageFlags::MINIMAL_REALIZATION) {
        return has_compensation && input_dpi != 0.0;
    }

    let never = flags.contains(GetImageFlags::NEVER_INSERT_DPI_COMPENSATION);
    let always = flags.contains(GetImageFlags::ALWAYS_INSERT_DPI_COMPENSATION);

    input_dpi != 0.0 && !never && (always || input_dpi != target_dpi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpi_independent_input_never_needs_compensation() {
        for flags in [
            GetImageFlags::NONE,
            GetImageFlags::ALWAYS_INSERT_DPI_COMPENSATION,
            GetImageFlags::MINIMAL_REALIZATION,
        ] {
            assert!(!compensation_needed(flags, true, 0.0, 96.0));
            assert!(!compensation_needed(flags, false, 0.0, 96.0));
        }
    }

    #[test]
    fn mismatch_needs_compensation() {
        assert!(compensation_needed(GetImageFlags::NONE, false, 192.0, 96.0));
        assert!(!compensation_needed(GetImageFlags::NONE, true, 96.0, 96.0));
    }

    #[test]
    fn never_wins_over_always() {
        let flags = GetImageFlags::NEVER_INSERT_DPI_COMPENSATION
            | GetImageFlags::ALWAYS_INSERT_DPI_COMPENSATION;
        assert!(!compensation_needed(flags, false, 192.0, 96.0));
    }

    #[test]
    fn always_compensates_matching_dpi() {
        assert!(compensation_needed(
            GetImageFlags::ALWAYS_INSERT_DPI_COMPENSATION,
            false,
            96.0,
            96.0
        ));
    }

    #[test]
    fn minimal_realization_keeps_current_state() {
        let flags = GetImageFlags::MINIMAL_REALIZATION;
        assert!(compensation_needed(flags, true, 96.0, 0.0));
        assert!(!compensation_needed(flags, false, 192.0, 96.0));
    }
}
