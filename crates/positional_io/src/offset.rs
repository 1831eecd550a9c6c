// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Offset resolution against a resource's size.
//!
//! A non-negative offset is an absolute position from the start of the
//! resource and passes through untouched — no size query is needed. A
//! negative offset counts back from the end of the resource, mirroring
//! `seek(SEEK_END, n)` with `n < 0`, and requires the resource's current
//! size. The "append" sentinel is not represented here; write paths that
//! omit the offset resolve it to the resource size directly.

use crate::error::{Error, Result};

/// Resolves a raw, possibly end-relative offset to an absolute byte position.
///
/// # Errors
///
/// Returns [`Error::InvalidOffset`] if a negative offset reaches back past
/// the start of the resource.
pub(crate) fn resolve(offset: i64, size: u64) -> Result<u64> {
    if let Ok(absolute) = u64::try_from(offset) {
        return Ok(absolute);
    }
    size.checked_add_signed(offset)
        .ok_or(Error::InvalidOffset { offset, size })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn non_negative_offsets_pass_through() {
        assert_eq!(resolve(0, 10).unwrap(), 0);
        assert_eq!(resolve(10, 10).unwrap(), 10);
        // Positions past the end are legal; reads report no data, writes extend.
        assert_eq!(resolve(25, 10).unwrap(), 25);
        assert_eq!(resolve(i64::MAX, 0).unwrap(), u64::try_from(i64::MAX).unwrap());
    }

    #[test]
    fn negative_offsets_count_back_from_the_end() {
        assert_eq!(resolve(-1, 10).unwrap(), 9);
        assert_eq!(resolve(-10, 10).unwrap(), 0);
    }

    #[test]
    fn offsets_past_the_start_are_rejected() {
        let err = resolve(-11, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidOffset { offset: -11, size: 10 }));
        assert!(matches!(resolve(-1, 0), Err(Error::InvalidOffset { .. })));
    }
}
