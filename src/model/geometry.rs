//! Geometry primitives for the element graph.
//!
//! All coordinates are in the host's native length unit. Solids are either
//! axis-aligned boxes or spheres, which is enough to distinguish a broad-phase
//! bounding-box test from an exact solid/solid intersection test.

use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether a transformed box stays axis-aligned.
const AXIS_ALIGNMENT_TOLERANCE: f64 = 1e-9;

/// A point (or vector) in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise sum.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise difference.
    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Scales the vector by `factor`.
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    /// Cross product.
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y.mul_add(other.z, -(self.z * other.y)),
            self.z.mul_add(other.x, -(self.x * other.z)),
            self.x.mul_add(other.y, -(self.y * other.x)),
        )
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub(other).length()
    }

    /// Returns the unit vector, or `None` for a zero-length vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f64::EPSILON {
            return None;
        }
        Some(self.scale(1.0 / len))
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl BoundingBox {
    /// Builds a box from two arbitrary corners, normalising each axis.
    #[must_use]
    pub fn from_corners(a: Point3, b: Point3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// A cube of half-width `half_width` centred at `center`.
    #[must_use]
    pub fn around(center: Point3, half_width: f64) -> Self {
        let h = half_width.abs();
        Self::from_corners(
            center.sub(Point3::new(h, h, h)),
            center.add(Point3::new(h, h, h)),
        )
    }

    /// A degenerate box enclosing a single point.
    #[must_use]
    pub const fn point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    /// Overlap test; boxes that only touch are considered intersecting.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Smallest box enclosing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        let d = self.max.sub(self.min);
        d.x * d.y * d.z
    }

    /// The eight corners of the box.
    #[must_use]
    pub const fn corners(&self) -> [Point3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    fn closest_point(&self, p: Point3) -> Point3 {
        p.max(self.min).min(self.max)
    }
}

/// A solid owned by an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Solid {
    /// An axis-aligned box.
    Box {
        /// Minimum corner.
        min: Point3,
        /// Maximum corner.
        max: Point3,
    },
    /// A sphere.
    Sphere {
        /// Centre point.
        center: Point3,
        /// Radius.
        radius: f64,
    },
}

impl Solid {
    /// Solid volume. Degenerate shapes have zero volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        match *self {
            Self::Box { min, max } => BoundingBox::from_corners(min, max).volume(),
            Self::Sphere { radius, .. } => {
                4.0 / 3.0 * std::f64::consts::PI * radius.abs().powi(3)
            }
        }
    }

    /// Axis-aligned bounds of the solid.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        match *self {
            Self::Box { min, max } => BoundingBox::from_corners(min, max),
            Self::Sphere { center, radius } => BoundingBox::around(center, radius),
        }
    }

    /// Exact solid/solid intersection.
    ///
    /// Solids must share interior volume; shapes that only touch do not
    /// intersect.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Self::Box { .. }, Self::Box { .. }) => {
                let (a, b) = (self.bounds(), other.bounds());
                a.min.x < b.max.x
                    && b.min.x < a.max.x
                    && a.min.y < b.max.y
                    && b.min.y < a.max.y
                    && a.min.z < b.max.z
                    && b.min.z < a.max.z
            }
            (Self::Sphere { center: c1, radius: r1 }, Self::Sphere { center: c2, radius: r2 }) => {
                c1.distance_to(c2) < r1.abs() + r2.abs()
            }
            (Self::Box { .. }, Self::Sphere { center, radius })
            | (Self::Sphere { center, radius }, Self::Box { .. }) => {
                let bounds = if matches!(self, Self::Box { .. }) {
                    self.bounds()
                } else {
                    other.bounds()
                };
                bounds.closest_point(center).distance_to(center) < radius.abs()
            }
        }
    }

    /// Applies a point mapping to the solid.
    ///
    /// Returns `None` if a box would no longer be axis-aligned afterwards.
    #[must_use]
    pub fn map_points(&self, f: impl Fn(Point3) -> Point3) -> Option<Self> {
        match *self {
            Self::Box { min, max } => {
                let original = BoundingBox::from_corners(min, max);
                let corners = original.corners().map(&f);
                let mapped = corners
                    .iter()
                    .skip(1)
                    .fold(BoundingBox::point(corners[0]), |acc, c| {
                        acc.union(&BoundingBox::point(*c))
                    });
                let drift = (mapped.volume() - original.volume()).abs();
                if drift > AXIS_ALIGNMENT_TOLERANCE * original.volume().max(1.0) {
                    return None;
                }
                Some(Self::Box {
                    min: mapped.min,
                    max: mapped.max,
                })
            }
            Self::Sphere { center, radius } => Some(Self::Sphere {
                center: f(center),
                radius,
            }),
        }
    }
}

/// A rotation axis defined by two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    /// Start point.
    pub start: Point3,
    /// End point.
    pub end: Point3,
}

impl Axis {
    /// Rotates `p` by `angle` radians around this axis (right-hand rule).
    ///
    /// Returns `None` if the axis has zero length.
    #[must_use]
    pub fn rotate(&self, p: Point3, angle: f64) -> Option<Point3> {
        let k = self.end.sub(self.start).normalized()?;
        let v = p.sub(self.start);
        let (sin, cos) = angle.sin_cos();
        // Rodrigues' rotation formula.
        let rotated = v
            .scale(cos)
            .add(k.cross(v).scale(sin))
            .add(k.scale(k.dot(v) * (1.0 - cos)));
        Some(rotated.add(self.start))
    }
}

/// A mirror plane defined by an origin and a normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// A point on the plane.
    pub origin: Point3,
    /// Plane normal (need not be unit length).
    pub normal: Point3,
}

impl Plane {
    /// Reflects `p` across the plane.
    ///
    /// Returns `None` if the normal has zero length.
    #[must_use]
    pub fn reflect(&self, p: Point3) -> Option<Point3> {
        let n = self.normal.normalized()?;
        let d = p.sub(self.origin).dot(n);
        Some(p.sub(n.scale(2.0 * d)))
    }
}
