mod assets;
mod error;
mod gpu;
mod interactive;
mod scene;
mod selection;


pub use error::ViewerError;
pub use interactive::{ViewerConfig, run_viewer};
pub use scene::{SceneConfig, SceneState};
pub use selection::{ModelCatalog, ModelEntry, ModelIndex, Selection};

fn main() {
    let config = ViewerConfig::default();

    if let Err(e) = run_viewer(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
