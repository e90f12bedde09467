//! Animated camera moves: frame all nodes ("fit") or go home ("reset").
//!
//! The renderer owns the actual camera; this controller only computes goals and
//! eases a [`CameraState`] toward them one frame at a time.

use super::store::GraphStore;
use crate::graph_utils::geometry::{Bounds, add, calculate_bounds, distance3d, lerp, normalize, scale, sub};
use crate::graph_utils::graph::{Node, Position};

pub const DEFAULT_CAMERA_POSITION: Position = [0.0, 8.0, 15.0];
pub const DEFAULT_CAMERA_TARGET: Position = [0.0, 0.0, 0.0];
pub const DEFAULT_FOV_DEGREES: f64 = 60.0;
/// Fraction of the remaining distance covered each frame (about half a second overall).
pub const CAMERA_LERP_SPEED: f64 = 0.08;
/// Breathing room multiplier around the bounding sphere.
pub const FIT_PADDING: f64 = 1.5;
/// Minimum camera distance for a single node or a tight cluster.
pub const MIN_FIT_DISTANCE: f64 = 8.0;
pub const ARRIVAL_EPSILON: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraAction {
    Fit,
    Reset,
}

/// What the renderer's camera looks like right now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Position,
    pub target: Position,
    pub fov_degrees: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: DEFAULT_CAMERA_POSITION,
            target: DEFAULT_CAMERA_TARGET,
            fov_degrees: DEFAULT_FOV_DEGREES,
        }
    }
}

impl CameraState {
    /// Unit vector from the look target back to the camera.
    fn backward(&self) -> Position {
        normalize(sub(self.position, self.target))
            .or_else(|| normalize(sub(DEFAULT_CAMERA_POSITION, DEFAULT_CAMERA_TARGET)))
            .unwrap_or([0.0, 0.0, 1.0])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Position,
    pub target: Position,
}

impl CameraPose {
    pub fn home() -> Self {
        Self { position: DEFAULT_CAMERA_POSITION, target: DEFAULT_CAMERA_TARGET }
    }
}

/// Camera pose that fits `bounds` in view while keeping the current viewing direction.
pub fn calculate_fit_position(camera: &CameraState, bounds: &Bounds, padding: f64) -> CameraPose {
    let fov = camera.fov_degrees.to_radians();
    let distance = (bounds.radius * padding / (fov / 2.0).sin()).max(MIN_FIT_DISTANCE);
    CameraPose {
        position: add(bounds.center, scale(camera.backward(), distance)),
        target: bounds.center,
    }
}

#[derive(Debug, Default)]
pub struct CameraController {
    goal: Option<CameraPose>,
    orbit_suspended: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_animating(&self) -> bool {
        self.goal.is_some()
    }

    pub fn goal(&self) -> Option<CameraPose> {
        self.goal
    }

    /// Whether the user may orbit the camera. Off while a node is dragged.
    pub fn orbit_enabled(&self) -> bool {
        !self.orbit_suspended
    }

    /// Start animating toward a pose framing `nodes`. No nodes, no move.
    pub fn trigger_fit(&mut self, camera: &CameraState, nodes: &[Node]) -> bool {
        match calculate_bounds(nodes) {
            Some(bounds) => {
                self.goal = Some(calculate_fit_position(camera, &bounds, FIT_PADDING));
                true
            }
            None => false,
        }
    }

    pub fn trigger_reset(&mut self) {
        self.goal = Some(CameraPose::home());
    }

    /// The user grabbed the camera; any running animation stops where it is.
    pub fn on_user_interaction(&mut self) {
        if self.goal.take().is_some() {
            log::debug!("camera animation interrupted by user");
        }
    }

    /// Pick up a pending fit/reset request from the store and track drag state.
    pub fn sync(&mut self, store: &mut GraphStore, camera: &CameraState) {
        self.orbit_suspended = store.dragging_node_id().is_some();
        let Some(action) = store.take_camera_action() else { return };
        if self.orbit_suspended {
            return;
        }
        match action {
            CameraAction::Fit => {
                self.trigger_fit(camera, store.nodes());
            }
            CameraAction::Reset => self.trigger_reset(),
        }
    }

    /// Advance one frame. Returns whether the animation is still running.
    pub fn tick(&mut self, camera: &mut CameraState) -> bool {
        let Some(goal) = self.goal else { return false };
        camera.position = lerp(camera.position, goal.position, CAMERA_LERP_SPEED);
        camera.target = lerp(camera.target, goal.target, CAMERA_LERP_SPEED);
        let arrived = distance3d(camera.position, goal.position) < ARRIVAL_EPSILON
            && distance3d(camera.target, goal.target) < ARRIVAL_EPSILON;
        if arrived {
            camera.position = goal.position;
            camera.target = goal.target;
            self.goal = None;
        }
        !arrived
    }
}
