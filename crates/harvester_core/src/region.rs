use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("invalid bounds ({min_x}, {min_y}, {max_x}, {max_y}): min must be below max on both axes")]
    InvalidBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    #[error("split factor {0} is not a positive perfect square")]
    InvalidFactor(u32),
}

/// Axis-aligned rectangle in the feed's planar coordinate reference.
///
/// Bounds are validated on construction and never change afterwards; the
/// fields are private so every `Region` in the program satisfies
/// `min < max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Region {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Region {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, RegionError> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(RegionError::InvalidBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Bounds as `[min_x, min_y, max_x, max_y]`.
    pub fn bounds(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Closed containment: points on the boundary are inside.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// True when the interiors overlap. Regions that only share an edge do not.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Partitions the region into an `n × n` grid where `factor = n²`.
    ///
    /// Cells are emitted row-major: rows from `min_y` upwards, and within a
    /// row columns from `min_x` rightwards. Interior grid lines are shared by
    /// neighbouring cells, and the outer cells reuse the input bounds
    /// exactly, so the union of the cells is the input region.
    pub fn split(&self, factor: u32) -> Result<Vec<Region>, RegionError> {
        let divisions = grid_divisions(factor).ok_or(RegionError::InvalidFactor(factor))?;
        if divisions == 1 {
            return Ok(vec![*self]);
        }

        let xs = grid_lines(self.min_x, self.max_x, divisions);
        let ys = grid_lines(self.min_y, self.max_y, divisions);

        let mut cells = Vec::with_capacity(factor as usize);
        for row in ys.windows(2) {
            for col in xs.windows(2) {
                cells.push(Region::new(col[0], row[0], col[1], row[1])?);
            }
        }
        Ok(cells)
    }
}

impl TryFrom<[f64; 4]> for Region {
    type Error = RegionError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        Region::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Region> for [f64; 4] {
    fn from(region: Region) -> Self {
        region.bounds()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Side length of the grid for `factor`, if `factor` is a positive perfect square.
pub fn grid_divisions(factor: u32) -> Option<u32> {
    if factor == 0 {
        return None;
    }
    let root = (factor as f64).sqrt().round() as u32;
    (root * root == factor).then_some(root)
}

fn grid_lines(min: f64, max: f64, divisions: u32) -> Vec<f64> {
    let step = (max - min) / divisions as f64;
    (0..=divisions)
        .map(|i| match i {
            0 => min,
            i if i == divisions => max,
            i => min + step * i as f64,
        })
        .collect()
}
