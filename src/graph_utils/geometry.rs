use super::graph::{Node, Position};

/// Minimum distance between node centres (world units). Closer means colliding.
pub const MIN_NODE_DISTANCE: f64 = 2.0;
/// Offset used when placing a freshly created node next to the right-most one.
pub const NODE_SPACING: f64 = MIN_NODE_DISTANCE * 2.0;
/// Radius floor for the bounding sphere of a single node (or coincident nodes).
pub const MIN_BOUNDS_RADIUS: f64 = 1.0;

const PARALLEL_EPSILON: f64 = 1e-9;

pub fn add(a: Position, b: Position) -> Position {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Position, b: Position) -> Position {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: Position, s: f64) -> Position {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn length(v: Position) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub fn distance3d(a: Position, b: Position) -> f64 {
    length(sub(a, b))
}

/// Unit vector in the direction of `v`, or `None` for a zero-length vector.
pub fn normalize(v: Position) -> Option<Position> {
    let len = length(v);
    if len <= PARALLEL_EPSILON {
        return None;
    }
    Some(scale(v, 1.0 / len))
}

/// Linear interpolation from `from` toward `to` by `alpha` in `[0, 1]`.
pub fn lerp(from: Position, to: Position, alpha: f64) -> Position {
    add(from, scale(sub(to, from), alpha))
}

/// Whether a node placed at `position` would sit within [`MIN_NODE_DISTANCE`]
/// of any node other than `dragged_id`.
pub fn check_collision(dragged_id: &str, position: Position, nodes: &[Node]) -> bool {
    nodes
        .iter()
        .filter(|n| n.id != dragged_id)
        .any(|n| distance3d(position, n.position) < MIN_NODE_DISTANCE)
}

/// A pointer ray in world space (camera origin, direction through the cursor).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Position,
    pub direction: Position,
}

impl Ray {
    pub fn new(origin: Position, direction: Position) -> Self {
        Self { origin, direction }
    }

    /// Intersection with the horizontal plane `y = height`.
    ///
    /// Returns `None` when the ray runs parallel to the plane or the plane lies
    /// behind the ray origin.
    pub fn intersect_horizontal_plane(&self, height: f64) -> Option<Position> {
        let dy = self.direction[1];
        if dy.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (height - self.origin[1]) / dy;
        if t < 0.0 {
            return None;
        }
        Some(add(self.origin, scale(self.direction, t)))
    }
}

/// Bounding sphere of a set of node positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Position,
    pub radius: f64,
}

/// Axis-aligned box around every node, reduced to its bounding sphere.
///
/// The sphere is centred on the box and its radius is half the box diagonal,
/// floored at [`MIN_BOUNDS_RADIUS`]. No nodes means no bounds.
pub fn calculate_bounds(nodes: &[Node]) -> Option<Bounds> {
    let first = nodes.first()?.position;
    let (min, max) = nodes.iter().skip(1).fold((first, first), |(mut lo, mut hi), n| {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(n.position[axis]);
            hi[axis] = hi[axis].max(n.position[axis]);
        }
        (lo, hi)
    });
    let center = scale(add(min, max), 0.5);
    let radius = distance3d(min, max) * 0.5;
    Some(Bounds {
        center,
        radius: radius.max(MIN_BOUNDS_RADIUS),
    })
}
