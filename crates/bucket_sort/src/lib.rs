//! Recursive bucket sort over numeric slices.
//!
//! Values are spread over `n` buckets by their position in the `[min, max]`
//! range, each bucket is finished with insertion sort (small buckets) or
//! another bucket-sort pass (large buckets), and the buckets are written back
//! into the input slice in index order.

use std::{cmp::Ordering, collections::BTreeMap};

use thiserror::Error;
use tracing::debug;

/// Bucket count used by the array service.
pub const DEFAULT_BUCKET_COUNT: usize = 5;

/// Buckets at or below this length are insertion-sorted instead of recursed into.
pub const INSERTION_SORT_THRESHOLD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("bucket count must be at least 1, got {0}")]
    InvalidBucketCount(usize),
}

/// A value that can be placed into one of `buckets` ranges spanning `[min, max]`.
pub trait BucketKey: Copy + PartialOrd {
    /// Computes `floor(buckets * (self - min) / (max - min + 1))`, clamped to
    /// `0..buckets`. Callers guarantee `min <= self <= max` and `buckets > 0`.
    fn bucket_index(self, min: Self, max: Self, buckets: usize) -> usize;

    /// A total order consistent with `PartialOrd` wherever that is defined.
    /// Used when a pass falls back to a comparison sort.
    fn total_order(&self, other: &Self) -> Ordering;
}

macro_rules! int_bucket_key {
    ($($ty:ty),*) => {$(
        impl BucketKey for $ty {
            fn bucket_index(self, min: Self, max: Self, buckets: usize) -> usize {
                // i128 keeps `max - min + 1` exact for the full 64-bit range.
                let offset = i128::from(self) - i128::from(min);
                let span = i128::from(max) - i128::from(min) + 1;
                let last = buckets as i128 - 1;
                (offset.saturating_mul(buckets as i128) / span).clamp(0, last) as usize
            }

            fn total_order(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }
        }
    )*};
}

macro_rules! float_bucket_key {
    ($($ty:ty),*) => {$(
        impl BucketKey for $ty {
            fn bucket_index(self, min: Self, max: Self, buckets: usize) -> usize {
                let scaled = (buckets as $ty) * (self - min) / (max - min + 1.0);
                // `as` saturates and maps NaN to 0.
                (scaled.floor() as usize).min(buckets - 1)
            }

            fn total_order(&self, other: &Self) -> Ordering {
                self.total_cmp(other)
            }
        }
    )*};
}

int_bucket_key!(i32, i64, u32, u64);
float_bucket_key!(f32, f64);

/// Sorts `values` in place with `buckets` buckets per pass and returns the
/// same slice.
///
/// Empty slices and slices whose elements are all equal are returned
/// untouched. A bucket count of zero is rejected before any work is done.
/// Any positive count is accepted: only non-empty buckets are allocated.
///
/// Float NaNs never panic the sort, but where they end up is unspecified.
pub fn bucket_sort<T: BucketKey>(values: &mut [T], buckets: usize) -> Result<&mut [T], SortError> {
    let sorter = BucketSorter::new(buckets)?;
    Ok(sorter.sort(values))
}

/// Stable in-place insertion sort. Returns the same slice it was given.
pub fn insertion_sort<T: PartialOrd + Copy>(values: &mut [T]) -> &mut [T] {
    for i in 1..values.len() {
        let element = values[i];
        let mut pos = i;

        while pos > 0 && values[pos - 1] > element {
            values[pos] = values[pos - 1];
            pos -= 1;
        }

        values[pos] = element;
    }
    values
}

/// Returns the smallest and largest element in one pass, or `None` when the
/// slice is empty.
pub fn get_min_max<T: PartialOrd + Copy>(values: &[T]) -> Option<(T, T)> {
    let (&first, rest) = values.split_first()?;
    let mut min_value = first;
    let mut max_value = first;

    for &item in rest {
        if item < min_value {
            min_value = item;
        } else if item > max_value {
            max_value = item;
        }
    }

    Some((min_value, max_value))
}

/// Bucket sort with a bucket count validated up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSorter {
    buckets: usize,
}

impl BucketSorter {
    pub fn new(buckets: usize) -> Result<Self, SortError> {
        if buckets == 0 {
            return Err(SortError::InvalidBucketCount(buckets));
        }
        Ok(Self { buckets })
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    pub fn sort<'a, T: BucketKey>(&self, values: &'a mut [T]) -> &'a mut [T] {
        debug!(len = values.len(), buckets = self.buckets, "bucket sort");
        sort_in_place(values, self.buckets);
        values
    }
}

impl Default for BucketSorter {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKET_COUNT,
        }
    }
}

fn sort_in_place<T: BucketKey>(values: &mut [T], buckets: usize) {
    let Some((min_value, max_value)) = get_min_max(values) else {
        return;
    };
    if min_value == max_value {
        return;
    }

    // Keyed by bucket index, so iteration visits buckets in index order.
    let mut partitions: BTreeMap<usize, Vec<T>> = BTreeMap::new();
    for &item in values.iter() {
        partitions
            .entry(item.bucket_index(min_value, max_value, buckets))
            .or_default()
            .push(item);
    }

    for bucket in partitions.values_mut() {
        if bucket.len() <= INSERTION_SORT_THRESHOLD {
            insertion_sort(bucket);
        } else if bucket.len() == values.len() {
            // Nothing was split off, so another pass would see the same input.
            bucket.sort_by(T::total_order);
        } else {
            sort_in_place(bucket, buckets);
        }
    }

    for (slot, item) in values.iter_mut().zip(partitions.into_values().flatten()) {
        *slot = item;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
