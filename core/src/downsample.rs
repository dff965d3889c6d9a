//! Decimation of ordered series.
//!
//! Two interchangeable reducers are provided, both pure and deterministic:
//!
//! - **Uniform stride** keeps the elements at `floor(i * len / target)` for `i` in `0..target`.
//!   It is cheap and is used for raw volume control (chart series, map track).
//! - **Largest Triangle Three Buckets** (LTTB) always keeps the first and last element and, for
//!   each of the `target - 2` interior buckets, keeps the element forming the largest triangle
//!   with the previously kept element and the centroid of the next bucket. Triangle areas are
//!   computed in three dimensions through the [`Point3`] trait, so the same code serves the 3D
//!   path budget (longitude, latitude, altitude) and the chart display budget (time, value, 0).
//!
//! Both return the input unchanged when it already fits in `target`, and otherwise return exactly
//! `target` elements.
use nalgebra::Vector3;

use crate::records::Sample;

/// Anything that can be placed in 3D space for triangle-area comparisons.
pub trait Point3 {
    fn coordinates(&self) -> [f64; 3];
}

impl Point3 for Sample {
    fn coordinates(&self) -> [f64; 3] {
        [self.lon, self.lat, self.altitude]
    }
}

impl Point3 for Vector3<f64> {
    fn coordinates(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Point3 for [f64; 3] {
    fn coordinates(&self) -> [f64; 3] {
        *self
    }
}

impl Point3 for (f64, f64) {
    fn coordinates(&self) -> [f64; 3] {
        [self.0, self.1, 0.0]
    }
}

/// Which reducer to apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    Uniform,
    #[default]
    Lttb,
}

/// Reduce `data` to at most `target` elements with the chosen method.
pub fn downsample<T: Point3 + Clone>(data: &[T], target: usize, method: Method) -> Vec<T> {
    match method {
        Method::Uniform => uniform(data, target),
        Method::Lttb => lttb(data, target),
    }
}

/// Indices kept by uniform-stride sampling.
pub fn uniform_indices(len: usize, target: usize) -> Vec<usize> {
    if len <= target {
        return (0..len).collect();
    }
    (0..target)
        .map(|i| (i as u128 * len as u128 / target as u128) as usize)
        .collect()
}

/// Uniform-stride sampling of `data`.
pub fn uniform<T: Clone>(data: &[T], target: usize) -> Vec<T> {
    uniform_indices(data.len(), target)
        .into_iter()
        .map(|i| data[i].clone())
        .collect()
}

/// Indices kept by LTTB sampling, in ascending order.
pub fn lttb_indices<T: Point3>(data: &[T], target: usize) -> Vec<usize> {
    let len = data.len();
    if len <= target {
        return (0..len).collect();
    }
    match target {
        0 => return Vec::new(),
        1 => return vec![0],
        2 => return vec![0, len - 1],
        _ => {}
    }

    let buckets = target - 2;
    let interior = len - 2;
    // Start of bucket `k` (k may equal `buckets`, which is the final element).
    let bucket_start = |k: usize| (k as u128 * interior as u128 / buckets as u128) as usize + 1;

    let mut kept = Vec::with_capacity(target);
    kept.push(0);
    let mut previous = 0;
    for i in 0..buckets {
        let next_start = bucket_start(i + 1);
        let next_end = bucket_start(i + 2).min(len);
        let centroid = mean_point(&data[next_start..next_end]);

        let range_start = bucket_start(i);
        let range_end = next_start;
        let a = finite(data[previous].coordinates());
        let mut max_area = -1.0;
        let mut max_index = range_start;
        for (j, point) in data.iter().enumerate().take(range_end).skip(range_start) {
            let area = triangle_area(a, finite(point.coordinates()), centroid);
            if area > max_area {
                max_area = area;
                max_index = j;
            }
        }
        kept.push(max_index);
        previous = max_index;
    }
    kept.push(len - 1);
    kept
}

/// LTTB sampling of `data`.
pub fn lttb<T: Point3 + Clone>(data: &[T], target: usize) -> Vec<T> {
    lttb_indices(data, target)
        .into_iter()
        .map(|i| data[i].clone())
        .collect()
}

fn finite(p: [f64; 3]) -> [f64; 3] {
    p.map(|c| if c.is_finite() { c } else { 0.0 })
}

fn mean_point<T: Point3>(points: &[T]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let mut sum = [0.0; 3];
    for p in points {
        let c = finite(p.coordinates());
        sum[0] += c[0];
        sum[1] += c[1];
        sum[2] += c[2];
    }
    let n = points.len() as f64;
    sum.map(|s| s / n)
}

fn triangle_area(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    let ab = Vector3::new(b[0] - a[0], b[1] - a[1], b[2] - a[2]);
    let ac = Vector3::new(c[0] - a[0], c[1] - a[1], c[2] - a[2]);
    0.5 * ab.cross(&ac).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn line(n: usize) -> Vec<(f64, f64)> {
        (0..n).map(|i| (i as f64, (i as f64 * 0.1).sin())).collect()
    }

    #[test]
    fn identity_when_small() {
        let data = line(10);
        assert_eq!(uniform(&data, 10), data);
        assert_eq!(lttb(&data, 25), data);
    }

    #[test]
    fn uniform_stride_positions() {
        assert_eq!(uniform_indices(10, 4), vec![0, 2, 5, 7]);
        assert_eq!(uniform_indices(9, 3), vec![0, 3, 6]);
        assert!(uniform_indices(100, 0).is_empty());
    }

    #[test]
    fn lttb_keeps_endpoints_and_length() {
        let data = line(1000);
        let out = lttb_indices(&data, 100);
        assert_eq!(out.len(), 100);
        assert_eq!(out[0], 0);
        assert_eq!(out[99], 999);
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn lttb_small_targets() {
        let data = line(50);
        assert!(lttb(&data, 0).is_empty());
        assert_eq!(lttb_indices(&data, 1), vec![0]);
        assert_eq!(lttb_indices(&data, 2), vec![0, 49]);
    }

    #[test]
    fn lttb_picks_spike() {
        let mut data: Vec<(f64, f64)> = (0..21).map(|i| (i as f64, 0.0)).collect();
        data[7].1 = 50.0;
        let kept = lttb_indices(&data, 5);
        assert!(kept.contains(&7), "spike should survive decimation: {kept:?}");
    }

    #[test]
    fn lttb_tolerates_nan() {
        let mut data: Vec<[f64; 3]> = (0..30).map(|i| [i as f64, 1.0, 2.0]).collect();
        data[4] = [f64::NAN, f64::NAN, f64::NAN];
        assert_eq!(lttb(&data, 10).len(), 10);
    }

    #[test]
    fn triangle_area_in_space() {
        assert_approx_eq!(triangle_area([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), 0.5);
        assert_approx_eq!(triangle_area([0.0; 3], [0.0, 0.0, 2.0], [0.0, 2.0, 0.0]), 2.0);
    }
}
