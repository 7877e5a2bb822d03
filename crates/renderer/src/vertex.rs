//! Vertex and uniform types shared between the CPU and the WGSL shaders.

use bytemuck::{Pod, Zeroable};

/// Mesh vertex with position, normal and UV coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self { position, normal, tex_coords }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // UV/Tex coords
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Full-screen quad vertex: NDC position and UV.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Corners of the full-screen quad. wgpu puts the UV origin in the top-left,
/// so the bottom NDC edge (y = -1) maps to v = 1.
#[rustfmt::skip]
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0, 0.0], tex_coords: [0.0, 1.0] },
    QuadVertex { position: [-1.0,  1.0, 0.0], tex_coords: [0.0, 0.0] },
    QuadVertex { position: [ 1.0,  1.0, 0.0], tex_coords: [1.0, 0.0] },
    QuadVertex { position: [ 1.0, -1.0, 0.0], tex_coords: [1.0, 1.0] },
];

/// Two triangles covering the quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Per-draw data for the geometry pass (must match gbuffer.wgsl `DrawUniform`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniform {
    /// Model (object to world) matrix.
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of view * model, for view-space normals.
    pub normal: [[f32; 4]; 4],
    /// rgb = diffuse color, a = specular intensity.
    pub diffuse_spec: [f32; 4],
}

/// Composition pass uniform (must match composition.wgsl `CompositionUniform`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CompositionUniform {
    pub proj: [[f32; 4]; 4],
    /// xyz = direction toward the light in view space.
    pub light_dir: [f32; 4],
    /// Color written where the geometry pass left depth at the clear value.
    pub sky_color: [f32; 4],
}
