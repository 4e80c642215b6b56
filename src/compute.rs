//! Element-wise sum on a worker's local slice.
//!
//! Pure compute on raw slices; by the time this runs, slice lengths have
//! been validated group-wide, so there is no failure mode here.

use num_traits::Num;

/// Returns the element-wise sum of two equal-length slices.
pub fn elementwise_sum<T: Num + Copy>(x: &[T], y: &[T]) -> Vec<T> {
  let mut out = Vec::with_capacity(x.len());
  elementwise_sum_into(x, y, &mut out);
  out
}

/// Writes the element-wise sum of `x` and `y` into `out`, replacing its
/// contents. With `out` pre-reserved to `x.len()` this performs no
/// allocation.
pub fn elementwise_sum_into<T: Num + Copy>(x: &[T], y: &[T], out: &mut Vec<T>) {
  debug_assert_eq!(x.len(), y.len(), "slice lengths must match");
  out.clear();
  out.extend(x.iter().zip(y).map(|(&a, &b)| a + b));
}
