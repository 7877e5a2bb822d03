//! Deferred rendering for the helicopter demo using wgpu.
//!
//! Each frame is two passes on one command encoder: a geometry pass that fills
//! the [`GeometryBuffer`] and a composition pass that turns it into the
//! visible image.

pub mod camera;
pub mod gbuffer;
pub mod mesh;
pub mod model;
pub mod pipeline;
pub mod renderer;
pub mod screenshot;
pub mod vertex;

pub use camera::*;
pub use gbuffer::*;
pub use mesh::*;
pub use model::*;
pub use pipeline::*;
pub use renderer::*;
pub use screenshot::*;
pub use vertex::*;

/// Device on whatever adapter is available, `None` on machines without one.
#[cfg(test)]
pub(crate) fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
}
