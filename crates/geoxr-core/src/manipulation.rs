//! Two-handed controller manipulation of the user anchor.
//!
//! The camera rides inside a single anchor node. Navigation never touches the
//! camera directly: grabbing with one controller pans the anchor, grabbing
//! with both translates, rotates (about the vertical axis) and uniformly
//! scales it. The XR device keeps driving the head pose independently.
//!
//! # Differencing policy
//!
//! Both gestures are frame-to-frame differentials. A controller's snapshot is
//! taken when its grip goes down, deltas are measured against the snapshot,
//! and every grabbing controller's snapshot then advances to its current pose.
//! The first grabbed frame therefore always yields a zero delta, and switching
//! between one and two hands never causes a jump.

use glam::{Mat4, Quat, Vec3};

/// Controller separation below which scale and rotation are not computed.
pub const MIN_SPAN: f32 = 1e-6;

/// One of the two tracked grip controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    /// Controller index 0.
    Left,
    /// Controller index 1.
    Right,
}

impl Hand {
    /// Both hands, in index order.
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    /// Index of this controller (0 or 1).
    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    /// The hand for a controller index, if it is one of the two tracked ones.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Hand::Left),
            1 => Some(Hand::Right),
            _ => None,
        }
    }
}

/// A single frame's reading of one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSample {
    /// Whether the primary grip/trigger button is held.
    pub pressed: bool,
    /// World transform of the grip.
    pub pose: Mat4,
}

impl ControllerSample {
    /// Create a sample from a full pose matrix.
    pub fn new(pressed: bool, pose: Mat4) -> Self {
        Self { pressed, pose }
    }

    /// Create a sample for a controller at `position` with no rotation.
    pub fn at(pressed: bool, position: Vec3) -> Self {
        Self::new(pressed, Mat4::from_translation(position))
    }

    /// Translation part of the pose.
    pub fn position(&self) -> Vec3 {
        self.pose.w_axis.truncate()
    }
}

/// Grab state tracked for one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Whether the grip was held on the last frame it was sampled.
    pub is_grabbing: bool,
    /// Reference pose for the next frame's delta.
    pub previous_pose: Mat4,
    /// Which controller this state belongs to.
    pub handle: Hand,
    /// Whether a sample arrived on the previous frame.
    sampled: bool,
}

impl ControllerState {
    /// Create an idle state for `handle`.
    pub fn new(handle: Hand) -> Self {
        Self {
            is_grabbing: false,
            previous_pose: Mat4::IDENTITY,
            handle,
            sampled: false,
        }
    }

    /// Translation part of the snapshot.
    pub fn previous_position(&self) -> Vec3 {
        self.previous_pose.w_axis.truncate()
    }
}

/// The transform node the camera is attached to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserAnchor {
    /// Translation in scene units.
    pub position: Vec3,
    /// Rotation about the vertical axis, in radians.
    pub yaw: f32,
    /// Uniform scale. Always positive.
    pub scale: f32,
}

impl Default for UserAnchor {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            scale: 1.0,
        }
    }
}

impl UserAnchor {
    /// Rotation quaternion for the current yaw.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// The anchor as a single affine matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation(),
            self.position,
        )
    }
}

/// What a frame's update did to the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// No controller was grabbing.
    Idle,
    /// One controller panned the anchor.
    Pan {
        /// The grabbing controller.
        hand: Hand,
        /// Translation added to the anchor.
        translation: Vec3,
    },
    /// Both controllers moved the anchor.
    TwoHanded {
        /// Translation added to the anchor.
        translation: Vec3,
        /// Factor the anchor scale was multiplied by (1 when guarded).
        scale_factor: f32,
        /// Angle added to the anchor yaw (0 when guarded).
        yaw_delta: f32,
    },
}

/// Per-frame grab tracking for the two grip controllers.
#[derive(Debug, Clone)]
pub struct TwoHandedManipulator {
    controllers: [ControllerState; 2],
}

impl Default for TwoHandedManipulator {
    fn default() -> Self {
        Self {
            controllers: [
                ControllerState::new(Hand::Left),
                ControllerState::new(Hand::Right),
            ],
        }
    }
}

impl TwoHandedManipulator {
    /// Create a manipulator with both controllers released.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one controller.
    pub fn controller(&self, hand: Hand) -> &ControllerState {
        &self.controllers[hand.index()]
    }

    /// Process one frame of controller input and update `anchor`.
    ///
    /// A `None` sample means the input source, its gamepad or its button
    /// array was missing this frame: that controller is skipped and its state
    /// is left as it was. It takes no part in the gesture until it is sampled
    /// again, at which point a held grip re-snapshots instead of jumping.
    pub fn update(
        &mut self,
        samples: [Option<ControllerSample>; 2],
        anchor: &mut UserAnchor,
    ) -> Gesture {
        let mut current: [Option<Vec3>; 2] = [None, None];

        for (state, sample) in self.controllers.iter_mut().zip(samples) {
            let Some(sample) = sample else {
                state.sampled = false;
                continue;
            };

            let grab_started = sample.pressed && (!state.is_grabbing || !state.sampled);
            state.is_grabbing = sample.pressed;
            state.sampled = true;

            if grab_started {
                state.previous_pose = sample.pose;
            }
            if state.is_grabbing {
                current[state.handle.index()] = Some(sample.position());
            }
        }

        let gesture = match current {
            [Some(left), Some(right)] => self.apply_two_handed(left, right, anchor),
            [Some(position), None] => self.apply_pan(Hand::Left, position, anchor),
            [None, Some(position)] => self.apply_pan(Hand::Right, position, anchor),
            [None, None] => Gesture::Idle,
        };

        // Advance snapshots so the next frame measures from here.
        for (state, sample) in self.controllers.iter_mut().zip(samples) {
            if let Some(sample) = sample
                && state.is_grabbing
            {
                state.previous_pose = sample.pose;
            }
        }

        if gesture != Gesture::Idle {
            tracing::trace!(?gesture, "applied controller gesture");
        }

        gesture
    }

    fn apply_pan(&self, hand: Hand, current: Vec3, anchor: &mut UserAnchor) -> Gesture {
        let translation = current - self.controllers[hand.index()].previous_position();
        anchor.position += translation;
        Gesture::Pan { hand, translation }
    }

    fn apply_two_handed(&self, left: Vec3, right: Vec3, anchor: &mut UserAnchor) -> Gesture {
        let prev_left = self.controllers[0].previous_position();
        let prev_right = self.controllers[1].previous_position();

        let v_old = prev_left - prev_right;
        let v_new = left - right;

        let translation = (left + right) * 0.5 - (prev_left + prev_right) * 0.5;
        anchor.position += translation;

        let old_span = v_old.length();
        let new_span = v_new.length();

        if old_span <= MIN_SPAN || new_span <= MIN_SPAN {
            tracing::trace!(old_span, new_span, "controllers coincide, skipping scale");
            return Gesture::TwoHanded {
                translation,
                scale_factor: 1.0,
                yaw_delta: 0.0,
            };
        }

        let scale_factor = new_span / old_span;
        let scale = anchor.scale * scale_factor;
        let (scale_factor, scale) = if scale.is_finite() && scale > 0.0 {
            (scale_factor, scale)
        } else {
            (1.0, anchor.scale)
        };
        anchor.scale = scale;

        let yaw_delta = heading(v_new) - heading(v_old);
        anchor.yaw += yaw_delta;

        Gesture::TwoHanded {
            translation,
            scale_factor,
            yaw_delta,
        }
    }
}

/// Heading of a vector in the horizontal plane.
fn heading(v: Vec3) -> f32 {
    v.z.atan2(v.x)
}
