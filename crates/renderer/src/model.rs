//! OBJ model loading: named meshes with per-material index ranges.

use crate::mesh::Mesh;
use crate::vertex::Vertex;
use glam::Vec3;
use std::io::BufRead;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Specular intensity used when neither the material nor the model provides one.
pub const DEFAULT_SPECULAR: f32 = 0.0;

/// Diffuse color for sub-meshes without a material.
pub const DEFAULT_DIFFUSE: Vec3 = Vec3::splat(0.8);

/// Errors raised while loading model files.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load {path:?}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("{0:?} contains no meshes")]
    Empty(PathBuf),
}

/// Surface properties for one contiguous range of a model's index buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: Vec3,
    /// Specular intensity written to the G-buffer. `None` defers to the model's fallback.
    pub specular: Option<f32>,
    /// First index of this material's range.
    pub index_offset: u32,
    /// Number of indices in this material's range.
    pub index_count: u32,
}

impl Material {
    pub fn specular_or(&self, fallback: f32) -> f32 {
        self.specular.unwrap_or(fallback)
    }

    /// Index range to pass to `draw_indexed`.
    pub fn index_range(&self) -> Range<u32> {
        self.index_offset..self.index_offset + self.index_count
    }
}

/// CPU-side model as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub materials: Vec<Material>,
}

/// A named model uploaded to the GPU.
pub struct Model {
    pub name: String,
    pub mesh: Mesh,
    pub materials: Vec<Material>,
    /// Specular for materials that carry none.
    pub fallback_specular: f32,
}

impl Model {
    pub fn upload(device: &wgpu::Device, data: ModelData) -> Self {
        let mesh = Mesh::new(device, &data.name, &data.vertices, &data.indices);
        Self {
            name: data.name,
            mesh,
            materials: data.materials,
            fallback_specular: DEFAULT_SPECULAR,
        }
    }

    pub fn with_fallback_specular(mut self, specular: f32) -> Self {
        self.fallback_specular = specular;
        self
    }
}

/// Load every named model from an OBJ file (materials from its MTL libraries).
pub fn load_models(path: impl AsRef<Path>) -> Result<Vec<ModelData>, ModelError> {
    let path = path.as_ref();
    let (models, materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| ModelError::Obj {
        path: path.to_path_buf(),
        source,
    })?;
    let merged = finish_load(path, models, materials)?;
    log::info!("Loaded {} model(s) from {:?}", merged.len(), path);
    Ok(merged)
}

/// Parse OBJ data from a reader. MTL libraries are resolved relative to `mtl_dir`.
pub fn parse_models<R: BufRead>(reader: &mut R, mtl_dir: &Path) -> Result<Vec<ModelData>, ModelError> {
    let (models, materials) = tobj::load_obj_buf(reader, &tobj::GPU_LOAD_OPTIONS, |p| {
        tobj::load_mtl(mtl_dir.join(p))
    })
    .map_err(|source| ModelError::Obj {
        path: mtl_dir.to_path_buf(),
        source,
    })?;
    finish_load(mtl_dir, models, materials)
}

fn finish_load(
    path: &Path,
    models: Vec<tobj::Model>,
    materials: Result<Vec<tobj::Material>, tobj::LoadError>,
) -> Result<Vec<ModelData>, ModelError> {
    let materials = materials.unwrap_or_else(|e| {
        log::warn!("No usable materials for {:?} ({}), using default colors", path, e);
        Vec::new()
    });
    let merged = merge_submeshes(models, &materials);
    if merged.is_empty() {
        return Err(ModelError::Empty(path.to_path_buf()));
    }
    Ok(merged)
}

/// tobj splits an object into one sub-mesh per material. Merge consecutive
/// sub-meshes sharing a name into one model with a material range each.
fn merge_submeshes(models: Vec<tobj::Model>, materials: &[tobj::Material]) -> Vec<ModelData> {
    let mut merged: Vec<ModelData> = Vec::new();

    for model in models {
        let mesh = model.mesh;
        if mesh.indices.is_empty() {
            continue;
        }
        if mesh.normals.is_empty() {
            log::warn!("Model '{}' has no normals, using +Y", model.name);
        }

        let material = mesh.material_id.and_then(|id| materials.get(id));
        let diffuse = material
            .and_then(|m| m.diffuse)
            .map(Vec3::from)
            .unwrap_or(DEFAULT_DIFFUSE);

        let target = match merged.last_mut() {
            Some(last) if last.name == model.name => last,
            _ => {
                merged.push(ModelData {
                    name: model.name.clone(),
                    vertices: Vec::new(),
                    indices: Vec::new(),
                    materials: Vec::new(),
                });
                let last = merged.len() - 1;
                &mut merged[last]
            }
        };

        let base_vertex = target.vertices.len() as u32;
        let index_offset = target.indices.len() as u32;
        let vertex_count = mesh.positions.len() / 3;
        target.vertices.extend((0..vertex_count).map(|i| {
            Vertex::new(
                read3(&mesh.positions, i).unwrap_or([0.0; 3]),
                read3(&mesh.normals, i).unwrap_or([0.0, 1.0, 0.0]),
                read2(&mesh.texcoords, i).unwrap_or([0.0; 2]),
            )
        }));
        target.indices.extend(mesh.indices.iter().map(|&i| i + base_vertex));
        target.materials.push(Material {
            diffuse,
            specular: None,
            index_offset,
            index_count: mesh.indices.len() as u32,
        });
    }

    merged
}

fn read3(data: &[f32], i: usize) -> Option<[f32; 3]> {
    data.get(i * 3..i * 3 + 3).map(|s| [s[0], s[1], s[2]])
}

fn read2(data: &[f32], i: usize) -> Option<[f32; 2]> {
    data.get(i * 2..i * 2 + 2).map(|s| [s[0], s[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submesh(name: &str, positions: Vec<f32>, indices: Vec<u32>, material_id: Option<usize>) -> tobj::Model {
        tobj::Model::new(
            tobj::Mesh {
                positions,
                indices,
                material_id,
                ..Default::default()
            },
            name.to_string(),
        )
    }

    fn red() -> tobj::Material {
        tobj::Material {
            name: "red".into(),
            diffuse: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        }
    }

    #[test]
    fn consecutive_submeshes_merge_into_material_ranges() {
        let tri = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let models = vec![
            submesh("main_rotor", tri.clone(), vec![0, 1, 2], Some(0)),
            submesh("main_rotor", tri.clone(), vec![0, 2, 1], None),
            submesh("slides", tri, vec![0, 1, 2], Some(0)),
        ];
        let merged = merge_submeshes(models, &[red()]);

        assert_eq!(merged.len(), 2);
        let rotor = &merged[0];
        assert_eq!(rotor.name, "main_rotor");
        assert_eq!(rotor.vertices.len(), 6);
        assert_eq!(rotor.indices, vec![0, 1, 2, 3, 5, 4]);
        assert_eq!(rotor.materials.len(), 2);
        assert_eq!(rotor.materials[0].diffuse, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(rotor.materials[1].diffuse, DEFAULT_DIFFUSE);
        assert_eq!(rotor.materials[1].index_range(), 3..6);
        assert_eq!(merged[1].name, "slides");
    }

    #[test]
    fn missing_normals_default_to_up() {
        let merged = merge_submeshes(vec![submesh("ground", vec![0.0; 9], vec![0, 1, 2], None)], &[]);
        assert!(merged[0].vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn specular_falls_back_when_absent() {
        let mut m = Material {
            diffuse: Vec3::ONE,
            specular: None,
            index_offset: 0,
            index_count: 3,
        };
        assert_eq!(m.specular_or(0.7), 0.7);
        m.specular = Some(0.2);
        assert_eq!(m.specular_or(0.7), 0.2);
    }

    #[test]
    fn parses_named_objects_from_reader() {
        let obj = "o body\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n\
                   o tail\nv 0 0 1\nv 1 0 1\nv 0 1 1\nv 1 1 1\nf 4 5 6 7\n";
        let models = parse_models(&mut obj.as_bytes(), Path::new(".")).unwrap();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["body", "tail"]);
        // The quad face is triangulated.
        assert_eq!(models[1].indices.len(), 6);
        assert_eq!(models[1].materials[0].index_count, 6);
    }

    #[test]
    fn empty_source_is_an_error() {
        let err = parse_models(&mut "# nothing here\n".as_bytes(), Path::new(".")).unwrap_err();
        assert!(matches!(err, ModelError::Empty(_)));
    }
}
