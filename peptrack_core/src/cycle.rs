//! Week and cycle arithmetic relative to a protocol's start date.
//!
//! Weeks are 1-based: the anchor date and the six days after it are week 1.
//! Dates before the anchor are "not yet started" and map to week 0 rather
//! than wrapping backwards into a previous cycle.

use chrono::NaiveDate;

/// Where a week falls within a repeating on/off cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CyclePosition {
    pub is_on: bool,
    /// 1-based position within the cycle, 0 when the protocol has not started
    pub position_within_cycle: u32,
}

/// 1-based week index of `date` counted from `anchor`, or 0 before the anchor
pub fn week_index_of(date: NaiveDate, anchor: NaiveDate) -> i64 {
    let days = (date - anchor).num_days();
    if days < 0 {
        return 0;
    }
    days / 7 + 1
}

/// Project a week index onto an `on_weeks` + `off_weeks` cycle
///
/// Week 1 starts the first "on" block; after `on_weeks` weeks the cycle rests
/// for `off_weeks` weeks, then repeats.
pub fn cycle_position_of(week_index: i64, on_weeks: u32, off_weeks: u32) -> CyclePosition {
    let period = i64::from(on_weeks) + i64::from(off_weeks);
    if week_index < 1 || period == 0 {
        return CyclePosition {
            is_on: false,
            position_within_cycle: 0,
        };
    }

    let position = (week_index - 1) % period + 1;
    CyclePosition {
        is_on: position <= i64::from(on_weeks),
        // position is in 1..=period, which came from two u32 values
        position_within_cycle: u32::try_from(position).unwrap_or(u32::MAX),
    }
}
