// SPDX-License-Identifier: MPL-2.0

//! Conversion of an imported OBJ scene into flat meshes.

use std::path::Path;

use glam::{Vec2, Vec3};

use super::{
    cache::{TextureCache, TextureLoader},
    MeshData, MeshTexture, ModelData, ModelError, TextureKind, Vertex,
};

/// Loads the model at `path`, resolving material textures through `cache`.
///
/// Each object in the file becomes one mesh, in file order. A missing or malformed material
/// library is not fatal: the geometry is still loaded, without textures.
pub fn import<L>(
    path: &Path,
    gamma_correction: bool,
    cache: &mut TextureCache<L>,
) -> Result<ModelData<L::Handle>, ModelError>
where
    L: TextureLoader,
    L::Error: std::error::Error + Send + Sync + 'static,
{
    let (models, materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| ModelError::Import {
            path: path.to_owned(),
            source,
        })?;
    let materials = materials.unwrap_or_else(|e| {
        tracing::warn!("Failed to load materials for {}: {}", path.display(), e);
        Vec::new()
    });

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
        _ => Path::new(".").to_owned(),
    };

    let mut meshes = Vec::with_capacity(models.len());
    for model in &models {
        let mesh = &model.mesh;
        let material = mesh.material_id.and_then(|id| materials.get(id));
        let textures = match material {
            Some(material) => load_material_textures(material, &directory, cache)?,
            None => Vec::new(),
        };

        tracing::debug!(
            "Imported mesh `{}`: {} vertices, {} triangles, {} texture(s)",
            model.name,
            mesh.positions.len() / 3,
            mesh.indices.len() / 3,
            textures.len(),
        );
        meshes.push(MeshData {
            vertices: process_vertices(mesh),
            indices: mesh.indices.clone(),
            textures,
        });
    }

    Ok(ModelData {
        meshes,
        directory,
        gamma_correction,
    })
}

/// Resolves a material's texture maps in sampler order: diffuse, specular, normal, height.
///
/// OBJ has no dedicated height-map slot, so by convention the ambient map carries it.
fn load_material_textures<L>(
    material: &tobj::Material,
    directory: &Path,
    cache: &mut TextureCache<L>,
) -> Result<Vec<MeshTexture<L::Handle>>, ModelError>
where
    L: TextureLoader,
    L::Error: std::error::Error + Send + Sync + 'static,
{
    let maps = [
        (TextureKind::Diffuse, &material.diffuse_texture),
        (TextureKind::Specular, &material.specular_texture),
        (TextureKind::Normal, &material.normal_texture),
        (TextureKind::Height, &material.ambient_texture),
    ];

    let mut textures = Vec::new();
    for (kind, file) in maps {
        if file.is_empty() {
            continue;
        }

        let handle = cache
            .get_or_load(directory, file, kind)
            .map_err(|e| ModelError::Texture {
                path: directory.join(file),
                source: Box::new(e),
            })?;
        textures.push(MeshTexture {
            kind,
            path: file.clone(),
            handle,
        });
    }

    Ok(textures)
}

fn process_vertices(mesh: &tobj::Mesh) -> Vec<Vertex> {
    let positions: Vec<Vec3> = mesh.positions.chunks_exact(3).map(Vec3::from_slice).collect();
    let normals: Vec<Vec3> = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals.chunks_exact(3).map(Vec3::from_slice).collect()
    } else {
        smooth_normals(&positions, &mesh.indices)
    };
    // Only the first set of texture coordinates is used, with V flipped to match a top-left
    // image origin.
    let tex_coords: Option<Vec<Vec2>> = (mesh.texcoords.len() / 2 == positions.len()
        && !positions.is_empty())
    .then(|| {
        mesh.texcoords
            .chunks_exact(2)
            .map(|uv| Vec2::new(uv[0], 1.0 - uv[1]))
            .collect()
    });
    let tangents = tex_coords
        .as_ref()
        .map(|uvs| tangent_frames(&positions, &normals, uvs, &mesh.indices));

    (0..positions.len())
        .map(|i| {
            let (tangent, bitangent) = tangents
                .as_ref()
                .map_or((Vec3::ZERO, Vec3::ZERO), |frames| frames[i]);

            Vertex {
                position: positions[i].to_array(),
                normal: normals[i].to_array(),
                tex_coords: tex_coords.as_ref().map_or([0.0; 2], |uvs| uvs[i].to_array()),
                tangent: tangent.to_array(),
                bitangent: bitangent.to_array(),
            }
        })
        .collect()
}

/// Generates per-vertex normals by summing the area-weighted normals of adjacent triangles.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [0, 1, 2].map(|i| triangle[i] as usize);
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        for i in [a, b, c] {
            normals[i] += face;
        }
    }

    normals.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Computes a per-vertex `(tangent, bitangent)` pair from texture-coordinate gradients.
///
/// Triangles with degenerate texture coordinates contribute nothing. Tangents and bitangents are
/// both made orthogonal to the vertex normal.
pub fn tangent_frames(
    positions: &[Vec3],
    normals: &[Vec3],
    tex_coords: &[Vec2],
    indices: &[u32],
) -> Vec<(Vec3, Vec3)> {
    let mut frames = vec![(Vec3::ZERO, Vec3::ZERO); positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [0, 1, 2].map(|i| triangle[i] as usize);
        let edge1 = positions[b] - positions[a];
        let edge2 = positions[c] - positions[a];
        let duv1 = tex_coords[b] - tex_coords[a];
        let duv2 = tex_coords[c] - tex_coords[a];

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = det.recip();
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

        for i in [a, b, c] {
            frames[i].0 += tangent;
            frames[i].1 += bitangent;
        }
    }

    frames
        .into_iter()
        .zip(normals)
        .map(|((tangent, bitangent), &normal)| {
            let tangent = (tangent - normal * normal.dot(tangent)).normalize_or_zero();
            let bitangent = (bitangent - normal * normal.dot(bitangent)).normalize_or_zero();
            (tangent, bitangent)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io, path::PathBuf};

    #[derive(Default)]
    struct RecordingLoader {
        loads: Vec<PathBuf>,
    }

    impl TextureLoader for RecordingLoader {
        type Handle = PathBuf;
        type Error = io::Error;

        fn load(&mut self, path: &Path, _: TextureKind) -> Result<PathBuf, io::Error> {
            if path.ends_with("missing.png") {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such texture"));
            }
            self.loads.push(path.to_owned());

            Ok(path.to_owned())
        }
    }

    const QUAD_OBJ: &str = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
o first
usemtl painted
f 1/1 2/2 3/3 4/4
o second
usemtl painted
f 1/1 2/2 3/3 4/4
";

    const SCENE_MTL: &str = "\
newmtl painted
Kd 1 1 1
map_Kd textures/diffuse.png
map_Ks ./textures/diffuse.png
map_Bump textures/normal.png
map_Ka textures/height.png
";

    fn write_scene(obj: &str, mtl: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.obj");
        fs::write(&path, obj).unwrap();
        fs::write(dir.path().join("scene.mtl"), mtl).unwrap();

        (dir, path)
    }

    #[test]
    fn imports_each_object_as_a_mesh() {
        let (dir, path) = write_scene(QUAD_OBJ, SCENE_MTL);
        let mut cache = TextureCache::new(RecordingLoader::default());

        let model = import(&path, false, &mut cache).unwrap();

        assert_eq!(model.directory, dir.path());
        assert_eq!(model.meshes.len(), 2);
        for mesh in &model.meshes {
            assert_eq!(mesh.vertices.len(), 4);
            assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        }
    }

    #[test]
    fn vertices_get_flipped_uvs_and_generated_frames() {
        let (_dir, path) = write_scene(QUAD_OBJ, SCENE_MTL);
        let mut cache = TextureCache::new(RecordingLoader::default());

        let model = import(&path, false, &mut cache).unwrap();
        let vertices = &model.meshes[0].vertices;

        assert_eq!(vertices[0].tex_coords, [0.0, 1.0]);
        assert_eq!(vertices[2].tex_coords, [1.0, 0.0]);
        for vertex in vertices {
            assert!(Vec3::from(vertex.normal).abs_diff_eq(Vec3::Z, 1e-5));
            assert!(Vec3::from(vertex.tangent).abs_diff_eq(Vec3::X, 1e-5));
            assert!(Vec3::from(vertex.bitangent).abs_diff_eq(-Vec3::Y, 1e-5));
        }
    }

    #[test]
    fn shared_textures_load_once() {
        let (dir, path) = write_scene(QUAD_OBJ, SCENE_MTL);
        let mut cache = TextureCache::new(RecordingLoader::default());

        let model = import(&path, true, &mut cache).unwrap();

        assert!(model.gamma_correction);
        let kinds: Vec<_> = model.meshes[0].textures.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TextureKind::Diffuse,
                TextureKind::Specular,
                TextureKind::Normal,
                TextureKind::Height,
            ]
        );
        assert_eq!(model.meshes[0].textures[0].handle, model.meshes[0].textures[1].handle);
        assert_eq!(
            cache.into_loader().loads,
            vec![
                dir.path().join("textures/diffuse.png"),
                dir.path().join("textures/normal.png"),
                dir.path().join("textures/height.png"),
            ]
        );
    }

    #[test]
    fn missing_uvs_yield_zeroed_attributes() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let (_dir, path) = write_scene(obj, "");
        let mut cache = TextureCache::new(RecordingLoader::default());

        let model = import(&path, false, &mut cache).unwrap();
        let mesh = &model.meshes[0];

        assert!(mesh.textures.is_empty());
        for vertex in &mesh.vertices {
            assert_eq!(vertex.tex_coords, [0.0, 0.0]);
            assert_eq!(vertex.tangent, [0.0; 3]);
            assert_eq!(vertex.bitangent, [0.0; 3]);
        }
    }

    #[test]
    fn file_normals_are_kept() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//1 2//1 3//1\n";
        let (_dir, path) = write_scene(obj, "");
        let mut cache = TextureCache::new(RecordingLoader::default());

        let model = import(&path, false, &mut cache).unwrap();

        for vertex in &model.meshes[0].vertices {
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn missing_model_is_an_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TextureCache::new(RecordingLoader::default());

        let err = import(&dir.path().join("nope.obj"), false, &mut cache).unwrap_err();
        assert!(matches!(err, ModelError::Import { .. }));
    }

    #[test]
    fn texture_failures_propagate() {
        let mtl = "newmtl painted\nmap_Kd missing.png\n";
        let (_dir, path) = write_scene(QUAD_OBJ, mtl);
        let mut cache = TextureCache::new(RecordingLoader::default());

        let err = import(&path, false, &mut cache).unwrap_err();
        match err {
            ModelError::Texture { path, .. } => assert!(path.ends_with("missing.png")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn frames_are_orthogonal_to_tilted_normals() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let tex_coords = [Vec2::ZERO, Vec2::X, Vec2::Y];

        let frames = tangent_frames(&positions, &[normal; 3], &tex_coords, &[0, 1, 2]);
        for (tangent, bitangent) in frames {
            assert!(tangent.abs_diff_eq(Vec3::X, 1e-5));
            assert!(bitangent.dot(normal).abs() < 1e-5);
            assert!(bitangent.abs_diff_eq(Vec3::new(0.0, 1.0, -1.0).normalize(), 1e-5));
        }
    }

    #[test]
    fn smooth_normals_average_adjacent_faces() {
        // Two triangles folded 90° along the shared X axis edge.
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let normals = smooth_normals(&positions, &[0, 1, 2, 0, 1, 3]);

        let expected = Vec3::new(0.0, -1.0, 1.0).normalize();
        assert!(normals[0].abs_diff_eq(expected, 1e-5));
        assert!(normals[1].abs_diff_eq(expected, 1e-5));
        assert!(normals[2].abs_diff_eq(Vec3::Z, 1e-5));
        assert!(normals[3].abs_diff_eq(-Vec3::Y, 1e-5));
    }
}
