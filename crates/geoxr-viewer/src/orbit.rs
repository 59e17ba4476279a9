//! Orbit camera for inspecting a model on the desktop.
//!
//! Left mouse drag rotates around the target, the scroll wheel zooms. Drags
//! are damped so the camera eases into place. The camera stays above the
//! horizontal plane through the target. The model viewer moves the target and
//! distance when it frames a new model.

use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;

/// Plugin for the orbit camera controls.
pub struct OrbitCameraPlugin;

impl Plugin for OrbitCameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitSettings>()
            .add_systems(
                Update,
                (orbit_zoom, orbit_rotate, orbit_damping, apply_orbit).chain(),
            );
    }
}

/// Orbit camera controller settings.
#[derive(Resource, Debug, Clone)]
pub struct OrbitSettings {
    /// Radians of rotation per pixel of mouse motion.
    pub rotate_sensitivity: f32,
    /// Distance multiplier per scroll line.
    pub zoom_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Share of the pending rotation applied per 60 Hz frame.
    pub damping: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.005,
            zoom_factor: 1.1,
            min_distance: 1.0,
            max_distance: 500.0,
            damping: 0.05,
        }
    }
}

/// Camera that circles a target point.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation about the vertical axis, in radians.
    pub yaw: f32,
    /// Elevation above the horizontal plane, in radians.
    pub pitch: f32,
    /// Yaw and pitch still to be applied.
    pub pending: Vec2,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            yaw: 0.0,
            pitch: 0.0,
            pending: Vec2::ZERO,
        }
    }
}

/// Pitch limit, just short of straight up.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

impl OrbitCamera {
    /// Look at `target` from `distance` along +Z.
    pub fn frame(&mut self, target: Vec3, distance: f32) {
        self.target = target;
        self.distance = distance;
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.pending = Vec2::ZERO;
    }

    /// World position of the camera. With zero yaw and pitch the camera sits
    /// on the +Z axis through the target.
    pub fn position(&self) -> Vec3 {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, -self.pitch, 0.0);
        self.target + rotation * Vec3::Z * self.distance
    }

    /// The camera transform, looking at the target.
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position()).looking_at(self.target, Vec3::Y)
    }

    /// Queue a drag of `delta` pixels.
    fn rotate(&mut self, delta: Vec2, sensitivity: f32) {
        self.pending += Vec2::new(-delta.x, delta.y) * sensitivity;
    }

    /// Apply `fraction` of the pending rotation.
    fn settle(&mut self, fraction: f32) {
        let step = self.pending * fraction;
        self.yaw += step.x;
        self.pitch = (self.pitch + step.y).clamp(0.0, MAX_PITCH);
        self.pending -= step;
        if self.pending.length_squared() < 1e-12 {
            self.pending = Vec2::ZERO;
        }
    }
}

/// Share of the pending rotation to apply over `dt` seconds.
fn damping_fraction(damping: f32, dt: f32) -> f32 {
    if damping >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - damping.max(0.0)).powf(dt * 60.0)
}

/// Zoom with the scroll wheel.
fn orbit_zoom(
    mut scroll_events: MessageReader<MouseWheel>,
    settings: Res<OrbitSettings>,
    mut query: Query<&mut OrbitCamera>,
) {
    let mut scroll = 0.0;
    for event in scroll_events.read() {
        // Normalize scroll value: web reports pixels, native reports lines.
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 120.0,
        };
    }
    if scroll == 0.0 {
        return;
    }

    let factor = settings.zoom_factor.powf(-scroll);
    for mut orbit in &mut query {
        orbit.distance =
            (orbit.distance * factor).clamp(settings.min_distance, settings.max_distance);
    }
}

/// Rotate while the left mouse button is held.
fn orbit_rotate(
    buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    settings: Res<OrbitSettings>,
    mut query: Query<&mut OrbitCamera>,
) {
    let delta: Vec2 = mouse_motion.read().map(|event| event.delta).sum();
    if delta == Vec2::ZERO || !buttons.pressed(MouseButton::Left) {
        return;
    }

    for mut orbit in &mut query {
        orbit.rotate(delta, settings.rotate_sensitivity);
    }
}

/// Ease pending rotation into yaw and pitch.
#[allow(clippy::needless_pass_by_value)]
fn orbit_damping(
    time: Res<Time>,
    settings: Res<OrbitSettings>,
    mut query: Query<&mut OrbitCamera>,
) {
    let fraction = damping_fraction(settings.damping, time.delta_secs());
    for mut orbit in &mut query {
        if orbit.pending != Vec2::ZERO {
            orbit.settle(fraction);
        }
    }
}

/// Write orbit state into the camera transform.
fn apply_orbit(mut query: Query<(&OrbitCamera, &mut Transform), Changed<OrbitCamera>>) {
    for (orbit, mut transform) in &mut query {
        *transform = orbit.transform();
    }
}
