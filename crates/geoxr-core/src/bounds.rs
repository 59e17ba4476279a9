//! Bounding boxes, model placement and camera fitting.

use glam::{Mat4, Vec3};

/// Default length of a normalized model's bounding-box diagonal.
pub const DEFAULT_TARGET_SIZE: f32 = 10.0;
/// Default padding multiplier applied to the camera fit distance.
pub const DEFAULT_FIT_PADDING: f32 = 1.2;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb3 {
    /// Create a box from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or `None` for no points.
    ///
    /// Non-finite points are ignored.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points
            .into_iter()
            .filter(|p| p.is_finite())
            .fold(None, |acc: Option<Self>, p| {
                Some(match acc {
                    Some(aabb) => Self::new(aabb.min.min(p), aabb.max.max(p)),
                    None => Self::new(p, p),
                })
            })
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Bounds of this box after an affine transform.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = (0..8).map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            matrix.transform_point3(corner)
        });
        // Eight finite corners always produce a box.
        Self::from_points(corners).unwrap_or(*self)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Largest side of the box.
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }
}

/// Settings for normalizing a freshly loaded model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// Diagonal length the model's bounding box is scaled to.
    pub target_size: f32,
    /// Multiplier on the distance needed to see the whole box.
    pub padding: f32,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            padding: DEFAULT_FIT_PADDING,
        }
    }
}

/// Translation and uniform scale that normalize a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub translation: Vec3,
    pub scale: f32,
}

impl Placement {
    /// Matrix form (scale, then translate).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            glam::Quat::IDENTITY,
            self.translation,
        )
    }

    /// Where a model-space point ends up.
    pub fn apply(&self, point: Vec3) -> Vec3 {
        point * self.scale + self.translation
    }
}

/// Compute the placement that centres `bounds` on the origin and scales its
/// diagonal to `target_size`.
///
/// A box with a zero (or non-finite) diagonal keeps scale 1 and is only
/// centred.
pub fn normalize(bounds: &Aabb3, target_size: f32) -> Placement {
    let diagonal = bounds.diagonal();
    let scale = if diagonal > f32::EPSILON && diagonal.is_finite() {
        target_size / diagonal
    } else {
        1.0
    };

    Placement {
        translation: -bounds.center() * scale,
        scale,
    }
}

/// Camera position that frames a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFit {
    /// Point the camera looks at (the box centre).
    pub target: Vec3,
    /// Camera position.
    pub position: Vec3,
    /// Distance from target to position.
    pub distance: f32,
}

/// Place the camera on the +Z axis through the box centre, far enough away
/// that the largest side of the box fits the vertical field of view.
///
/// `fov_y` is in radians.
pub fn fit_camera(bounds: &Aabb3, fov_y: f32, padding: f32) -> CameraFit {
    let center = bounds.center();
    let half_fov_tan = (fov_y * 0.5).tan();
    let distance = (bounds.max_extent() * 0.5 / half_fov_tan).abs() * padding;
    let distance = if distance.is_finite() { distance } else { 0.0 };

    CameraFit {
        target: center,
        position: center + Vec3::Z * distance,
        distance,
    }
}
