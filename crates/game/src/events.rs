//! Window event handling for DemoState.

use anyhow::Result;
use input::Command;
use winit::event::WindowEvent;
use winit::keyboard::PhysicalKey;

impl crate::DemoState {
    /// Handle a window event. Returns true if the app should exit.
    pub(crate) fn handle_window_event(&mut self, event: WindowEvent) -> Result<bool> {
        match event {
            WindowEvent::CloseRequested => return Ok(true),
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.renderer.resize(size)?;
                if size.width > 0 && size.height > 0 {
                    self.scene.rig.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match self.input.process_keyboard(key, event.state, event.repeat) {
                        Some(Command::Quit) => return Ok(true),
                        Some(Command::Screenshot) => {
                            self.renderer.request_screenshot(self.screenshot_path.clone());
                        }
                        Some(command) => self.scene.rig.apply(command),
                        None => {}
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.process_mouse_button(button, state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(delta) = self.input.process_cursor_position((position.x, position.y)) {
                    self.scene.rig.orbit(delta);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = self.input.process_scroll(delta);
                self.scene.rig.zoom(lines);
            }
            WindowEvent::RedrawRequested => {
                self.frame()?;
                self.renderer.window.request_redraw();
            }
            _ => {}
        }
        Ok(false)
    }
}
