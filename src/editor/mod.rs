pub mod camera;
pub mod drag;
pub mod interaction;
pub mod store;
