//! Reverse/absolute index conversion.
//!
//! Absolute index 0 is the oldest log entry. Reverse index 0 is the newest.
//! Reverse indices are signed because relative undo arithmetic may step past
//! the newest entry before being range-checked.

/// `len - 1 - reverse`, or `None` when the result falls outside the log.
#[must_use]
pub fn absolute(len: usize, reverse: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let abs = len.checked_sub(1)?.checked_sub(reverse)?;
    if (0..len).contains(&abs) {
        usize::try_from(abs).ok()
    } else {
        None
    }
}

/// `len - 1 - absolute`, or `None` when `absolute` is not a log position.
#[must_use]
pub fn reverse(len: usize, absolute: usize) -> Option<i64> {
    if absolute >= len {
        return None;
    }
    i64::try_from(len - 1 - absolute).ok()
}
