//! Translation between the index spaces of the views.
//!
//! The same recording is held in several arrays of different lengths: the full sample series,
//! the chart series (time-indexed rows only, stride-reduced), the 3D path (LTTB-reduced) and the
//! map track (stride-reduced). A moment in time therefore has a different index in each array.
//! Every translation goes through [`map_index`], which scales proportionally, floors and clamps,
//! so that all consumers agree on rounding.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proportional index translation: `floor(index / from_len * to_len)` clamped to `[0, to_len - 1]`.
///
/// The last index of the source (and anything past it) maps to the last index of the target, so
/// both ends of a full-range selection line up. Index `0` and either length being zero map to `0`.
pub fn map_index(index: usize, from_len: usize, to_len: usize) -> usize {
    if index == 0 || from_len == 0 || to_len == 0 {
        return 0;
    }
    if index >= from_len - 1 {
        return to_len - 1;
    }
    let scaled = (index as u128 * to_len as u128 / from_len as u128) as usize;
    scaled.min(to_len - 1)
}

/// The arrays a selection can be expressed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSpace {
    /// Every parsed sample
    Raw,
    /// Chart series
    Chart,
    /// 3D path positions
    Path,
    /// Map track points
    Map,
}

impl IndexSpace {
    pub const ALL: [IndexSpace; 4] = [
        IndexSpace::Raw,
        IndexSpace::Chart,
        IndexSpace::Path,
        IndexSpace::Map,
    ];
}

impl fmt::Display for IndexSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexSpace::Raw => "raw",
            IndexSpace::Chart => "chart",
            IndexSpace::Path => "path",
            IndexSpace::Map => "map",
        };
        f.write_str(name)
    }
}

impl FromStr for IndexSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "samples" => Ok(IndexSpace::Raw),
            "chart" | "charts" => Ok(IndexSpace::Chart),
            "path" | "3d" => Ok(IndexSpace::Path),
            "map" | "gps" => Ok(IndexSpace::Map),
            other => Err(format!("unknown index space '{other}'")),
        }
    }
}

/// Inclusive index range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    /// Build a range, swapping the bounds when given in reverse.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            IndexRange { start, end }
        } else {
            IndexRange {
                start: end,
                end: start,
            }
        }
    }
    /// Number of indices covered (always at least one).
    pub fn count(&self) -> usize {
        self.end.abs_diff(self.start) + 1
    }
    pub fn contains(&self, index: usize) -> bool {
        (self.start.min(self.end)..=self.start.max(self.end)).contains(&index)
    }
}

/// Lengths of every index space of one loaded dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceLengths {
    pub raw: usize,
    pub chart: usize,
    pub path: usize,
    pub map: usize,
}

impl SpaceLengths {
    pub fn len(&self, space: IndexSpace) -> usize {
        match space {
            IndexSpace::Raw => self.raw,
            IndexSpace::Chart => self.chart,
            IndexSpace::Path => self.path,
            IndexSpace::Map => self.map,
        }
    }
}

/// Translates indices and ranges between the spaces of one dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexMapper {
    lengths: SpaceLengths,
}

impl IndexMapper {
    pub fn new(lengths: SpaceLengths) -> Self {
        IndexMapper { lengths }
    }
    pub fn lengths(&self) -> SpaceLengths {
        self.lengths
    }
    /// Translate a single index from one space to another.
    pub fn map(&self, index: usize, from: IndexSpace, to: IndexSpace) -> usize {
        if from == to {
            return index.min(self.lengths.len(to).saturating_sub(1));
        }
        map_index(index, self.lengths.len(from), self.lengths.len(to))
    }
    /// Translate both ends of an inclusive range.
    pub fn map_range(&self, range: IndexRange, from: IndexSpace, to: IndexSpace) -> IndexRange {
        IndexRange::new(self.map(range.start, from, to), self.map(range.end, from, to))
    }
}
