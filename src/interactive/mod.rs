//! Interactive viewer: window, input handling and the frame loop

mod viewer;

pub use viewer::{ViewerConfig, run_viewer};
