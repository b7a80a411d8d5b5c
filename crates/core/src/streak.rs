//! Calendar-day practice streaks.

use chrono::NaiveDate;

/// Streak length after a session completed on `today`.
///
/// Only calendar dates matter: any number of sessions on the same day leave the
/// streak unchanged, a session on the day after the last one extends it, and
/// anything else (a gap, no history, a last date in the future) restarts at 1.
#[must_use]
pub fn next_streak(current: u32, last_session: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(last) = last_session else {
        return 1;
    };
    if last == today {
        return current;
    }
    if today.pred_opt() == Some(last) {
        return current.saturating_add(1);
    }
    1
}
