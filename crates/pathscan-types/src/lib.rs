use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 8-bit RGB color annotation carried by every [`Point`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A 3-D scan point with a color annotation.
///
/// Two points are equal when their three coordinates are exactly equal; the
/// color never takes part in the comparison.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub color: Rgb,
}

impl Point {
    /// Create an uncolored (black) point.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            color: Rgb::default(),
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Coordinate along `axis`.
    pub fn coord(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn distance_squared(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// True when all three coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

/// Bare 3-D coordinate, the unit of the snapshot query response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Frame header propagated unchanged from a scan to every set derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: DateTime<Utc>,
    /// Coordinate frame the points are expressed in, e.g. `"camera_depth_optical_frame"`.
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: DateTime<Utc>, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// An ordered sequence of points plus the header of the scan it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    #[serde(default)]
    pub header: Header,
    pub points: Vec<Point>,
}

impl PointSet {
    pub fn new(header: Header, points: Vec<Point>) -> Self {
        Self { header, points }
    }

    /// An empty set with a default header.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Build a derived set that carries this set's header.
    pub fn with_points(&self, points: Vec<Point>) -> Self {
        Self {
            header: self.header.clone(),
            points,
        }
    }

    /// Flat list of coordinates, dropping color annotations.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.points.iter().map(Point::coordinate).collect()
    }
}

/// Axis used to pick the extreme seed point of a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

impl FromStr for Axis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(ConfigError::UnknownAxis(s.to_string())),
        }
    }
}

/// Which voxel difference counts as a significant scene change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCriterion {
    /// Reference points that fall in voxels the incoming scan does not occupy.
    #[default]
    VacatedVoxels,
    /// Incoming points that fall in voxels the reference does not occupy.
    AddedVoxels,
    /// Either of the above.
    Either,
}

impl fmt::Display for ChangeCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCriterion::VacatedVoxels => write!(f, "vacated_voxels"),
            ChangeCriterion::AddedVoxels => write!(f, "added_voxels"),
            ChangeCriterion::Either => write!(f, "either"),
        }
    }
}

/// Startup configuration rejected before any scan is processed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("voxel resolution must be positive, got {0}")]
    NonPositiveResolution(f32),

    #[error("voxel resolution must be finite")]
    NonFiniteResolution,

    #[error("cluster size K must be at least 1")]
    ZeroClusterSize,

    #[error("unknown axis '{0}' (expected x, y or z)")]
    UnknownAxis(String),
}

/// Errors surfaced by the scan pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Scan Parse Error: {0}")]
    Parse(String),

    #[error("I/O Error: {0}")]
    Io(String),
}
