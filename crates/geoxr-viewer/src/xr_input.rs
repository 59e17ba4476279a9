//! Controller input and two-handed navigation of the user anchor.
//!
//! Controller poses come from one of two sources:
//! - the host page on WASM, which forwards WebXR grip poses through
//!   `submit_controller_pose` / `clear_controller`
//! - the keyboard emulator on native, which moves two virtual controllers
//!
//! Every frame the latest samples are fed to the [`TwoHandedManipulator`] and
//! the resulting [`UserAnchor`] is written to the anchor entity's transform,
//! ahead of transform propagation.

use bevy::ecs::message::MessageReader;
use bevy::prelude::*;
use geoxr_core::manipulation::{ControllerSample, Gesture, Hand, TwoHandedManipulator, UserAnchor};

/// Where the virtual controllers start, relative to the anchor.
const EMULATED_REST: [Vec3; 2] = [Vec3::new(-0.3, 1.2, -0.5), Vec3::new(0.3, 1.2, -0.5)];

/// Closest the emulated controllers may get to each other.
const MIN_EMULATED_SPAN: f32 = 0.05;

/// Plugin for controller input and anchor manipulation.
pub struct XrInputPlugin {
    /// Drive the controllers from the keyboard.
    pub emulate: bool,
}

impl Plugin for XrInputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControllerSamples>()
            .init_resource::<AnchorState>()
            .add_message::<ResetAnchor>()
            .add_systems(
                Update,
                (reset_anchor, apply_manipulation, draw_controllers).chain(),
            );

        #[cfg(target_family = "wasm")]
        app.add_systems(Update, host::receive_host_poses.before(apply_manipulation));

        if self.emulate {
            app.init_resource::<EmulatorSettings>()
                .init_resource::<EmulatedControllers>()
                .add_systems(Update, emulate_controllers.before(apply_manipulation));
        }
    }
}

/// Latest reading of each controller, indexed by [`Hand::index`].
#[derive(Resource, Default, Debug)]
pub struct ControllerSamples(pub [Option<ControllerSample>; 2]);

/// Manipulation state of the user anchor.
#[derive(Resource, Debug)]
pub struct AnchorState {
    pub manipulator: TwoHandedManipulator,
    pub anchor: UserAnchor,
    /// What the last frame's update did.
    pub gesture: Gesture,
}

impl Default for AnchorState {
    fn default() -> Self {
        Self {
            manipulator: TwoHandedManipulator::new(),
            anchor: UserAnchor::default(),
            gesture: Gesture::Idle,
        }
    }
}

impl AnchorState {
    /// Run one frame of manipulation.
    pub fn update(&mut self, samples: [Option<ControllerSample>; 2]) -> Gesture {
        self.gesture = self.manipulator.update(samples, &mut self.anchor);
        self.gesture
    }
}

/// The entity the camera rides inside.
#[derive(Component)]
pub struct UserAnchorRoot;

/// Request to put the anchor back at the origin.
#[derive(Message, Debug, Clone, Copy)]
pub struct ResetAnchor;

/// Transform of the anchor entity for the given state.
pub fn anchor_transform(anchor: &UserAnchor) -> Transform {
    Transform {
        translation: anchor.position,
        rotation: anchor.rotation(),
        scale: Vec3::splat(anchor.scale),
    }
}

fn reset_anchor(mut requests: MessageReader<ResetAnchor>, mut state: ResMut<AnchorState>) {
    if requests.read().count() > 0 {
        *state = AnchorState::default();
        tracing::info!("Anchor reset");
    }
}

/// Apply this frame's controller samples to the anchor.
#[allow(clippy::needless_pass_by_value)]
fn apply_manipulation(
    samples: Res<ControllerSamples>,
    mut state: ResMut<AnchorState>,
    mut query: Query<&mut Transform, With<UserAnchorRoot>>,
) {
    state.update(samples.0);

    for mut transform in &mut query {
        *transform = anchor_transform(&state.anchor);
    }
}

/// Draw a sphere at each sampled controller, green while grabbing.
#[allow(clippy::needless_pass_by_value)]
fn draw_controllers(mut gizmos: Gizmos, samples: Res<ControllerSamples>, state: Res<AnchorState>) {
    let to_world = state.anchor.matrix();
    for sample in samples.0.iter().flatten() {
        let color = if sample.pressed {
            Color::srgb(0.2, 1.0, 0.3)
        } else {
            Color::srgb(0.8, 0.8, 0.8)
        };
        let position = to_world.transform_point3(sample.position());
        gizmos.sphere(position, 0.05 * state.anchor.scale, color);
    }
}

// ============================================================================
// Keyboard controller emulator
// ============================================================================

/// Key bindings and speeds for the controller emulator.
#[derive(Resource, Debug, Clone)]
pub struct EmulatorSettings {
    pub left_grip: KeyCode,
    pub right_grip: KeyCode,
    pub forward: KeyCode,
    pub back: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub up: KeyCode,
    pub down: KeyCode,
    /// Move the controllers apart.
    pub spread: KeyCode,
    /// Move the controllers together.
    pub squeeze: KeyCode,
    pub twist_left: KeyCode,
    pub twist_right: KeyCode,
    /// Controller speed in metres per second.
    pub move_speed: f32,
    /// Twist speed in radians per second.
    pub twist_speed: f32,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            left_grip: KeyCode::KeyQ,
            right_grip: KeyCode::KeyE,
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            up: KeyCode::KeyR,
            down: KeyCode::KeyF,
            spread: KeyCode::KeyZ,
            squeeze: KeyCode::KeyX,
            twist_left: KeyCode::KeyC,
            twist_right: KeyCode::KeyV,
            move_speed: 1.0,
            twist_speed: 1.0,
        }
    }
}

/// Positions of the two virtual controllers.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct EmulatedControllers(pub [Vec3; 2]);

impl Default for EmulatedControllers {
    fn default() -> Self {
        Self(EMULATED_REST)
    }
}

/// One frame of emulator input, already scaled by the frame time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmulatorStep {
    /// Translation applied to both controllers.
    pub movement: Vec3,
    /// Change in distance between the controllers.
    pub spread: f32,
    /// Rotation of the pair about their midpoint, around +Y.
    pub twist: f32,
}

impl EmulatedControllers {
    /// Move the virtual controllers.
    pub fn step(&mut self, step: EmulatorStep) {
        let [a, b] = self.0;
        let mid = (a + b) * 0.5;
        let half = (a - b) * 0.5;

        let length = half.length();
        let new_length = (length + step.spread * 0.5).max(MIN_EMULATED_SPAN * 0.5);
        let half = Quat::from_rotation_y(step.twist) * half.normalize_or(Vec3::X) * new_length;

        let mid = mid + step.movement;
        self.0 = [mid + half, mid - half];
    }
}

fn axis(keyboard: &ButtonInput<KeyCode>, positive: KeyCode, negative: KeyCode) -> f32 {
    let pressed = |key| f32::from(u8::from(keyboard.pressed(key)));
    pressed(positive) - pressed(negative)
}

/// Drive the controller samples from the keyboard.
#[allow(clippy::needless_pass_by_value)]
fn emulate_controllers(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<EmulatorSettings>,
    mut controllers: ResMut<EmulatedControllers>,
    mut samples: ResMut<ControllerSamples>,
) {
    let dt = time.delta_secs();
    let direction = Vec3::new(
        axis(&keyboard, settings.right, settings.left),
        axis(&keyboard, settings.up, settings.down),
        axis(&keyboard, settings.back, settings.forward),
    );

    controllers.step(EmulatorStep {
        movement: direction.normalize_or_zero() * settings.move_speed * dt,
        spread: axis(&keyboard, settings.spread, settings.squeeze) * settings.move_speed * dt,
        twist: axis(&keyboard, settings.twist_left, settings.twist_right)
            * settings.twist_speed
            * dt,
    });

    for hand in Hand::BOTH {
        let grip = match hand {
            Hand::Left => settings.left_grip,
            Hand::Right => settings.right_grip,
        };
        samples.0[hand.index()] = Some(ControllerSample::at(
            keyboard.pressed(grip),
            controllers.0[hand.index()],
        ));
    }
}

// ============================================================================
// Host page bridge
// ============================================================================

/// Entry points for the page hosting the WASM build.
#[cfg(target_family = "wasm")]
mod host {
    use std::sync::LazyLock;

    use bevy::prelude::*;
    use geoxr_core::manipulation::{ControllerSample, Hand};
    use wasm_bindgen::prelude::*;

    use super::ControllerSamples;

    /// A controller update from the page.
    struct PoseUpdate {
        hand: Hand,
        sample: Option<ControllerSample>,
    }

    type Pair = (
        async_channel::Sender<PoseUpdate>,
        async_channel::Receiver<PoseUpdate>,
    );

    static HOST_POSES: LazyLock<Pair> = LazyLock::new(async_channel::unbounded);

    fn push(update: PoseUpdate) {
        if HOST_POSES.0.try_send(update).is_err() {
            tracing::warn!("Pose channel closed; dropping controller update");
        }
    }

    /// Report a controller's grip pose (column-major 4x4) and grip button.
    #[wasm_bindgen]
    pub fn submit_controller_pose(index: u32, pressed: bool, matrix: Vec<f32>) {
        let Some(hand) = Hand::from_index(index as usize) else {
            tracing::warn!("Ignoring pose for controller {index}");
            return;
        };
        let Ok(cols) = <[f32; 16]>::try_from(matrix.as_slice()) else {
            tracing::warn!("Ignoring pose with {} matrix elements", matrix.len());
            return;
        };
        push(PoseUpdate {
            hand,
            sample: Some(ControllerSample::new(pressed, Mat4::from_cols_array(&cols))),
        });
    }

    /// Report that a controller's input source is gone.
    #[wasm_bindgen]
    pub fn clear_controller(index: u32) {
        if let Some(hand) = Hand::from_index(index as usize) {
            push(PoseUpdate { hand, sample: None });
        }
    }

    /// Apply every update the page sent since the last frame.
    pub(super) fn receive_host_poses(mut samples: ResMut<ControllerSamples>) {
        while let Ok(update) = HOST_POSES.1.try_recv() {
            samples.0[update.hand.index()] = update.sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(controllers: &EmulatedControllers) -> f32 {
        controllers.0[0].distance(controllers.0[1])
    }

    fn midpoint(controllers: &EmulatedControllers) -> Vec3 {
        (controllers.0[0] + controllers.0[1]) * 0.5
    }

    #[test]
    fn test_emulator_spread_and_twist_keep_midpoint() {
        let mut controllers = EmulatedControllers::default();
        let mid = midpoint(&controllers);
        let before = span(&controllers);

        controllers.step(EmulatorStep {
            spread: 0.4,
            twist: 0.3,
            ..Default::default()
        });

        assert!((span(&controllers) - (before + 0.4)).abs() < 1e-5);
        assert!((midpoint(&controllers) - mid).length() < 1e-5);
        // Twisting about +Y keeps both controllers at the same height.
        assert!((controllers.0[0].y - controllers.0[1].y).abs() < 1e-5);
    }

    #[test]
    fn test_emulator_squeeze_stops_at_minimum_span() {
        let mut controllers = EmulatedControllers::default();
        controllers.step(EmulatorStep {
            spread: -10.0,
            ..Default::default()
        });
        assert!((span(&controllers) - MIN_EMULATED_SPAN).abs() < 1e-5);
    }

    #[test]
    fn test_emulated_spread_scales_anchor() {
        let mut controllers = EmulatedControllers::default();
        let mut state = AnchorState::default();
        let samples = |c: &EmulatedControllers| {
            [
                Some(ControllerSample::at(true, c.0[0])),
                Some(ControllerSample::at(true, c.0[1])),
            ]
        };

        // First grabbed frame only takes the snapshot.
        assert!(matches!(
            state.update(samples(&controllers)),
            Gesture::TwoHanded { .. }
        ));
        assert_eq!(state.anchor.scale, 1.0);

        let before = span(&controllers);
        controllers.step(EmulatorStep {
            spread: before,
            ..Default::default()
        });
        state.update(samples(&controllers));
        assert!((state.anchor.scale - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_anchor_transform() {
        let anchor = UserAnchor {
            position: Vec3::new(1.0, 2.0, 3.0),
            yaw: 0.5,
            scale: 2.0,
        };
        let transform = anchor_transform(&anchor);
        let point = Vec3::new(0.3, -0.2, 1.0);
        let expected = anchor.matrix().transform_point3(point);
        assert!((transform.transform_point(point) - expected).length() < 1e-5);
    }
}
