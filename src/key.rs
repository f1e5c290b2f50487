//! Key ordering and range helpers
//!
//! Keys are arbitrary non-empty byte strings ordered by unsigned byte-wise
//! lexicographic comparison. This is exactly the `Ord` of `[u8]` and
//! `Bytes`, so the store's `BTreeMap` and every merge step agree on it.
//!
//! Range bounds use the empty byte string as "unbounded": an empty `begin`
//! starts at the smallest key, an empty `end` runs to +∞.

use std::cmp::Ordering;
use std::ops::Bound;

use bytes::Bytes;

use crate::error::{Result, SnapError};

/// Compare two keys (unsigned byte-wise lexicographic)
#[inline]
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Reject the empty key
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(SnapError::invalid("key must not be empty"));
    }
    Ok(())
}

/// Check a half-open range `[begin, end)`
///
/// Only a range whose bounds are both non-empty with `begin > end` is
/// invalid. `begin == end` is valid and simply empty.
pub fn validate_range(begin: &[u8], end: &[u8]) -> Result<()> {
    if !begin.is_empty() && !end.is_empty() && compare(begin, end) == Ordering::Greater {
        return Err(SnapError::invalid(format!(
            "range begin {:?} sorts after end {:?}",
            Bytes::copy_from_slice(begin),
            Bytes::copy_from_slice(end)
        )));
    }
    Ok(())
}

/// Convert `[begin, end)` with empty-means-unbounded into `Bound`s
pub(crate) fn to_bounds(begin: &[u8], end: &[u8]) -> (Bound<Bytes>, Bound<Bytes>) {
    let lower = if begin.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(Bytes::copy_from_slice(begin))
    };
    let upper = if end.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(Bytes::copy_from_slice(end))
    };
    (lower, upper)
}

/// Whether `key` falls inside `[begin, end)` (empty bounds unbounded)
pub(crate) fn in_range(key: &[u8], begin: &[u8], end: &[u8]) -> bool {
    (begin.is_empty() || key >= begin) && (end.is_empty() || key < end)
}

/// Half-open range covering exactly the keys that start with `prefix`
///
/// `begin` is the prefix itself. `end` is the prefix with its trailing 0xFF
/// bytes removed and the last remaining byte incremented; when nothing
/// remains (empty or all-0xFF prefix) `end` is empty, i.e. +∞.
///
/// ```
/// let (begin, end) = snapkv::prefix_range(b"/p/");
/// assert_eq!(&begin[..], b"/p/");
/// assert_eq!(&end[..], b"/p0");
///
/// let (_, end) = snapkv::prefix_range(b"a\xff\xff");
/// assert_eq!(&end[..], b"b");
/// ```
pub fn prefix_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let begin = prefix.to_vec();
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last != 0xFF {
            end.push(last + 1);
            return (begin, end);
        }
    }
    (begin, end)
}
