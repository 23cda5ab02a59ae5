//! Interactive model viewer using wgpu + winit

use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::error::ViewerError;
use crate::gpu::{GpuContext, Renderer};
use crate::scene::{OrbitCamera, OrbitControls, SceneConfig, SceneState};

/// Configuration for the viewer window
#[derive(Clone)]
pub struct ViewerConfig {
    /// Lights, ground, camera and the model catalog
    pub scene: SceneConfig,
    /// Base window title; the model list is appended
    pub title: String,
    /// Initial window size in logical pixels
    pub window_size: (u32, u32),
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            title: "Model Viewer".to_string(),
            window_size: (1280, 720),
        }
    }
}

/// Window title listing every model, with the active one bracketed
fn window_title(base: &str, scene: &SceneState) -> String {
    let catalog = scene.catalog();
    let options: Vec<String> = catalog
        .indices()
        .map(|index| {
            let label = &catalog.entry(index).label;
            if scene.selection().is_active(index) {
                format!("[{}: {}]", index.get() + 1, label)
            } else {
                format!("{}: {}", index.get() + 1, label)
            }
        })
        .collect();
    format!("{} - {} (Tab to switch, ESC to exit)", base, options.join("  "))
}

/// Catalog position selected by a number key
fn digit_index(key: KeyCode) -> Option<usize> {
    let n = match key {
        KeyCode::Digit1 | KeyCode::Numpad1 => 0,
        KeyCode::Digit2 | KeyCode::Numpad2 => 1,
        KeyCode::Digit3 | KeyCode::Numpad3 => 2,
        KeyCode::Digit4 | KeyCode::Numpad4 => 3,
        KeyCode::Digit5 | KeyCode::Numpad5 => 4,
        KeyCode::Digit6 | KeyCode::Numpad6 => 5,
        KeyCode::Digit7 | KeyCode::Numpad7 => 6,
        KeyCode::Digit8 | KeyCode::Numpad8 => 7,
        KeyCode::Digit9 | KeyCode::Numpad9 => 8,
        _ => return None,
    };
    Some(n)
}

/// Viewer state, created once the window exists
struct ViewerState {
    config: ViewerConfig,
    gpu_ctx: GpuContext,
    renderer: Renderer,
    scene: SceneState,
    camera: OrbitCamera,
    controls: OrbitControls,
    last_frame: Instant,
}

impl ViewerState {
    fn new(window: Arc<Window>, config: ViewerConfig, scene: SceneState) -> Result<Self, ViewerError> {
        let gpu_ctx = GpuContext::new(window)?;
        let renderer = Renderer::new(&gpu_ctx, &scene);

        let (width, height) = gpu_ctx.size;
        let camera = OrbitCamera::from_config(&scene.config.camera, width as f32 / height as f32);

        Ok(Self {
            config,
            gpu_ctx,
            renderer,
            scene,
            camera,
            controls: OrbitControls::new(),
            last_frame: Instant::now(),
        })
    }

    fn refresh_title(&self) {
        self.gpu_ctx
            .window()
            .set_title(&window_title(&self.config.title, &self.scene));
    }

    fn on_selection_changed(&self) {
        let active = self.scene.selection().active();
        println!("Model: {}", self.scene.catalog().entry(active).label);
        self.refresh_title();
    }

    fn select_position(&mut self, n: usize) {
        if let Some(index) = self.scene.catalog().nth(n) {
            self.scene.select(index);
            self.on_selection_changed();
        }
    }

    fn select_next(&mut self) {
        self.scene.select_next();
        self.on_selection_changed();
    }

    fn reset_camera(&mut self) {
        let aspect = self.camera.aspect;
        self.camera = OrbitCamera::from_config(&self.scene.config.camera, aspect);
        println!("Camera reset");
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu_ctx.resize((width, height));
        self.camera.set_aspect(width, height);
    }

    /// Advance animations and draw. Returns false when the viewer should exit.
    fn update_and_render(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.scene.advance(dt);

        match self.renderer.render(&self.gpu_ctx, &self.scene, &self.camera) {
            Ok(()) => true,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.gpu_ctx.reconfigure();
                true
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                false
            }
            Err(e) => {
                log::error!("Render error: {:?}", e);
                true
            }
        }
    }
}

/// Application handler for winit event loop
struct ViewerApp {
    config: ViewerConfig,
    /// Loaded scene waiting for the window to be created
    pending_scene: Option<SceneState>,
    state: Option<ViewerState>,
    error: Option<ViewerError>,
}

impl ViewerApp {
    fn new(config: ViewerConfig, scene: SceneState) -> Self {
        Self {
            config,
            pending_scene: Some(scene),
            state: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: ViewerError) {
        log::error!("Failed to create viewer: {}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let Some(scene) = self.pending_scene.take() else {
            return;
        };

        let (width, height) = self.config.window_size;
        let window_attrs = Window::default_attributes()
            .with_title(window_title(&self.config.title, &scene))
            .with_inner_size(winit::dpi::LogicalSize::new(width as f64, height as f64));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match ViewerState::new(window, self.config.clone(), scene) {
            Ok(state) => {
                println!("=== Model Viewer ===");
                println!("Controls:");
                println!("  1-9         - Select model");
                println!("  Tab         - Next model");
                println!("  Left Drag   - Orbit camera");
                println!("  Right Drag  - Pan camera");
                println!("  Wheel       - Zoom");
                println!("  R           - Reset camera");
                println!("  ESC         - Exit");
                println!();

                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(s) => s,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                if let Some(n) = digit_index(key) {
                    state.select_position(n);
                    return;
                }
                match key {
                    KeyCode::Escape => event_loop.exit(),
                    KeyCode::Tab => state.select_next(),
                    KeyCode::KeyR => state.reset_camera(),
                    _ => {}
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                state
                    .controls
                    .cursor_moved(position.x as f32, position.y as f32, &mut state.camera);
            }

            WindowEvent::CursorLeft { .. } => {
                state.controls.cursor_left();
            }

            WindowEvent::MouseInput { state: btn_state, button, .. } => {
                let pressed = btn_state == ElementState::Pressed;
                match button {
                    MouseButton::Left => state.controls.set_rotating(pressed),
                    MouseButton::Right | MouseButton::Middle => state.controls.set_panning(pressed),
                    _ => {}
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_x, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.02,
                };
                state.controls.scrolled(lines, &mut state.camera);
            }

            WindowEvent::RedrawRequested => {
                if !state.update_and_render() {
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            // Request continuous redraw for animation playback
            state.gpu_ctx.request_redraw();
        }
    }
}

/// Load every model, open the window and run until it is closed
pub fn run_viewer(config: ViewerConfig) -> Result<(), ViewerError> {
    env_logger::init();

    let scene = SceneState::load(config.scene.clone())?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config, scene);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_title_marks_active_model() {
        let mut scene = SceneState::new(SceneConfig::default(), vec![]).unwrap();
        let title = window_title("Model Viewer", &scene);
        assert!(title.starts_with("Model Viewer - [1: Model 1]  2: Model 2"));

        scene.select_next();
        let title = window_title("Model Viewer", &scene);
        assert!(title.contains("1: Model 1  [2: Model 2]"));
    }

    #[test]
    fn test_digit_keys() {
        assert_eq!(digit_index(KeyCode::Digit1), Some(0));
        assert_eq!(digit_index(KeyCode::Numpad9), Some(8));
        assert_eq!(digit_index(KeyCode::KeyA), None);
    }
}
