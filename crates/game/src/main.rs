//! Deferred-shading helicopter demo.

mod config;
mod events;
mod helicopter;
mod scene;

use anyhow::Result;
use engine_core::Time;
use input::InputState;
use renderer::Renderer;
use scene::SceneState;
use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Frames between frame-rate log lines.
const FPS_LOG_INTERVAL: u64 = 600;

/// Everything alive while the window is open.
pub(crate) struct DemoState {
    renderer: Renderer,
    scene: SceneState,
    input: InputState,
    time: Time,
    screenshot_path: PathBuf,
}

impl DemoState {
    async fn new(window: Arc<Window>, config: &config::GameConfig) -> Result<Self> {
        let renderer = Renderer::new(window, config.render_settings()).await?;
        let (width, height) = renderer.dimensions();
        let scene = SceneState::load(renderer.device(), width, height, config)?;
        Ok(Self {
            renderer,
            scene,
            input: InputState::new(),
            time: Time::new(),
            screenshot_path: config.screenshot_path.clone(),
        })
    }

    /// Advance the simulation by the wall-clock frame time and draw.
    fn frame(&mut self) -> Result<()> {
        self.time.update();
        if self.time.frame_count() % FPS_LOG_INTERVAL == 0 {
            log::debug!("{:.1} fps, {:.0}s elapsed", self.time.fps(), self.time.elapsed_seconds());
        }
        self.scene.update(self.input.controls(), self.time.delta_seconds());
        let items = self.scene.draw_items();
        self.renderer.render(self.scene.camera(), &items)
    }
}

/// Application handler for winit.
struct App {
    config: config::GameConfig,
    state: Option<DemoState>,
    /// Set when startup or a frame failed fatally.
    failed: bool,
}

impl App {
    fn new(config: config::GameConfig) -> Self {
        Self {
            config,
            state: None,
            failed: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.failed = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Helicopter")
            .with_inner_size(winit::dpi::LogicalSize::new(self.config.window_width, self.config.window_height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => return self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window")),
        };

        match pollster::block_on(DemoState::new(window.clone(), &self.config)) {
            Ok(state) => {
                self.state = Some(state);
                window.request_redraw();
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize demo")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        match state.handle_window_event(event) {
            Ok(true) => event_loop.exit(),
            Ok(false) => {}
            Err(e) => self.fail(event_loop, e),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Helicopter demo");
    println!("  W/S    pitch        A/D    roll         Q/E  yaw");
    println!("  Shift  throttle up  Space  throttle down");
    println!("  Mouse  drag to orbit, wheel to zoom");
    println!("  0 reset orbit  1 free orbit  2 follow  P screenshot  Esc quit");

    let config = config::GameConfig::load();
    log::info!("Starting with {:?} composition", config.composition);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if app.failed {
        anyhow::bail!("Demo exited after a fatal error");
    }
    Ok(())
}
