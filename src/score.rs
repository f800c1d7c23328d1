//! Linear accessibility score.
//!
//! Every unfixed issue costs [`PENALTY_PER_ISSUE`] points regardless of
//! severity; the score floors at 0 and is exactly 100 only when nothing is
//! left to fix.

use crate::model::Issue;

pub const PENALTY_PER_ISSUE: usize = 5;

pub fn score_for_unfixed(unfixed: usize) -> u8 {
    if unfixed == 0 {
        return 100;
    }
    100usize.saturating_sub(PENALTY_PER_ISSUE.saturating_mul(unfixed)) as u8
}

pub fn accessibility_score(issues: &[Issue]) -> u8 {
    score_for_unfixed(issues.iter().filter(|i| !i.fixed).count())
}
