//! Meaningful-touch predicate
//!
//! Decides whether a visit carries enough marketing signal to update the
//! last-non-direct slot.

use super::params::VisitParams;

/// A touch is meaningful when a click ID is present, or when both
/// `utm_source` and `utm_medium` are set.
pub fn is_meaningful_touch(params: &VisitParams) -> bool {
    params.has_click_id() || (params.utm_source.is_some() && params.utm_medium.is_some())
}
