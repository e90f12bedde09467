pub mod api;
pub mod cloud;
pub mod editor;
pub mod error;
pub mod graph_utils;
pub mod persistence;

pub use error::{PulsarError, Result};
