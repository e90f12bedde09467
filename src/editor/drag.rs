//! Dragging nodes across a horizontal plane.
//!
//! The plane sits at the node's height when the drag begins, so nodes keep
//! their Y coordinate and move only in X/Z. The pointer's offset from the
//! node centre at grab time is preserved for the whole drag.

use crate::graph_utils::geometry::Ray;
use crate::graph_utils::graph::{NodeId, Position};

#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub node_id: NodeId,
    /// Position before the drag; restored when the drop collides.
    pub origin: Position,
    plane_height: f64,
    // node minus grab point, in X and Z
    offset: [f64; 2],
    pub colliding: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragOutcome {
    Committed(Position),
    Reverted(Position),
}

impl DragSession {
    pub fn start(node_id: &str, origin: Position, ray: &Ray) -> Self {
        let plane_height = origin[1];
        let offset = match ray.intersect_horizontal_plane(plane_height) {
            Some(hit) => [origin[0] - hit[0], origin[2] - hit[2]],
            None => [0.0, 0.0],
        };
        Self {
            node_id: node_id.to_string(),
            origin,
            plane_height,
            offset,
            colliding: false,
        }
    }

    /// Candidate node position for the current pointer ray, or `None` if the
    /// ray misses the drag plane.
    pub fn project(&self, ray: &Ray) -> Option<Position> {
        let hit = ray.intersect_horizontal_plane(self.plane_height)?;
        Some([hit[0] + self.offset[0], self.plane_height, hit[2] + self.offset[1]])
    }
}
