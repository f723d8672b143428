//! Sorting of crossings
//!
//! Crossings are sorted together with the edge indices they belong to, both
//! arrays are permuted in lockstep. All sorts are stable.

/// Below this length merge sort falls back to insertion sort
pub const MERGE_INSERTION_THRESHOLD: usize = 14;

/// Index of the first element in sorted `keys` that is greater than `key`
#[inline]
pub fn upper_bound(keys: &[i32], key: i32) -> usize {
    let mut low = 0;
    let mut high = keys.len();
    while low < high {
        let mid = (low + high) / 2;
        if keys[mid] <= key {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

/// Insert `key` and `value` at `index`, shifting `[index, end)` one to the right
///
/// Element at `end` is overwritten.
#[inline]
pub fn shift_insert(keys: &mut [i32], values: &mut [u32], index: usize, end: usize, key: i32, value: u32) {
    keys.copy_within(index..end, index + 1);
    values.copy_within(index..end, index + 1);
    keys[index] = key;
    values[index] = value;
}

/// Stable insertion sort
pub fn insertion_sort(keys: &mut [i32], values: &mut [u32]) {
    for index in 1..keys.len() {
        let key = keys[index];
        if keys[index - 1] <= key {
            continue;
        }
        let value = values[index];
        let mut pos = index - 1;
        while pos > 0 && keys[pos - 1] > key {
            pos -= 1;
        }
        shift_insert(keys, values, pos, index, key, value);
    }
}

/// Merge two sorted runs `src[..mid]` and `src[mid..]` into `dst`
pub fn merge_runs(
    src_keys: &[i32],
    src_values: &[u32],
    mid: usize,
    dst_keys: &mut [i32],
    dst_values: &mut [u32],
) {
    let len = src_keys.len();
    debug_assert!(dst_keys.len() >= len && dst_values.len() >= len);
    // already ordered
    if mid == 0 || mid == len || src_keys[mid - 1] <= src_keys[mid] {
        dst_keys[..len].copy_from_slice(src_keys);
        dst_values[..len].copy_from_slice(src_values);
        return;
    }
    let (mut left, mut right) = (0, mid);
    for index in 0..len {
        let take_left = right >= len || (left < mid && src_keys[left] <= src_keys[right]);
        let from = if take_left {
            left += 1;
            left - 1
        } else {
            right += 1;
            right - 1
        };
        dst_keys[index] = src_keys[from];
        dst_values[index] = src_values[from];
    }
}

/// Stable merge sort using `aux_*` as a scratch space of at least the same length
pub fn merge_sort(keys: &mut [i32], values: &mut [u32], aux_keys: &mut [i32], aux_values: &mut [u32]) {
    let len = keys.len();
    if len <= MERGE_INSERTION_THRESHOLD {
        insertion_sort(keys, values);
        return;
    }
    let mid = len / 2;
    {
        let (aux_keys_low, aux_keys_high) = aux_keys.split_at_mut(mid);
        let (aux_values_low, aux_values_high) = aux_values.split_at_mut(mid);
        let (keys_low, keys_high) = keys.split_at_mut(mid);
        let (values_low, values_high) = values.split_at_mut(mid);
        merge_sort(keys_low, values_low, aux_keys_low, aux_values_low);
        merge_sort(keys_high, values_high, aux_keys_high, aux_values_high);
    }
    aux_keys[..len].copy_from_slice(keys);
    aux_values[..len].copy_from_slice(values);
    merge_runs(&aux_keys[..len], &aux_values[..len], mid, keys, values);
}
