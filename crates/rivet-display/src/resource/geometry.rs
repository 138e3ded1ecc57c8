use crate::backend::{BackendBuffer, BufferKind, GpuBackend};
use crate::draw::{MAX_INDEXED_VERTICES, ModelVertex};
use crate::error::DisplayError;

/// One independently drawable mesh of a compiled geometry set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<ModelVertex>,
    /// Triangle corners, relative to this mesh's first vertex.
    pub triangles: Vec<[u16; 3]>,
}

impl Mesh {
    pub fn needs_texture_matrix_scale(&self) -> bool {
        self.vertices.iter().any(ModelVertex::needs_texture_matrix_scale)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MeshInfo {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub triangle_start: u32,
    pub triangle_count: u32,
    pub needs_texture_matrix_scale: bool,
}

/// Vertex and index buffers shared by a set of meshes.
#[derive(Debug)]
pub struct CompiledGeometry {
    meshes: Vec<MeshInfo>,
    vertices: BackendBuffer,
    indices: BackendBuffer,
}

fn layout(meshes: &[Mesh]) -> Result<Vec<MeshInfo>, DisplayError> {
    let mut infos = Vec::with_capacity(meshes.len());
    let (mut v, mut t) = (0usize, 0usize);
    for m in meshes {
        infos.push(MeshInfo {
            vertex_start: v as u32,
            vertex_count: m.vertices.len() as u32,
            triangle_start: t as u32,
            triangle_count: m.triangles.len() as u32,
            needs_texture_matrix_scale: m.needs_texture_matrix_scale(),
        });
        v += m.vertices.len();
        t += m.triangles.len();
    }
    if v > MAX_INDEXED_VERTICES {
        log::error!("compiled geometry has {v} vertices; 16-bit indices address {MAX_INDEXED_VERTICES}");
        return Err(DisplayError::TooManyVertices { count: v });
    }
    Ok(infos)
}

fn same_topology(infos: &[MeshInfo], meshes: &[Mesh]) -> bool {
    infos.len() == meshes.len()
        && infos.iter().zip(meshes).all(|(i, m)| {
            i.vertex_count as usize == m.vertices.len()
                && i.triangle_count as usize == m.triangles.len()
        })
}

impl CompiledGeometry {
    /// Sizes the buffers for `meshes`, at least one element each.
    pub fn allocate<B: GpuBackend + ?Sized>(
        backend: &mut B,
        meshes: &[Mesh],
    ) -> Result<Self, DisplayError> {
        let infos = layout(meshes)?;
        let total_vertices: usize = meshes.iter().map(|m| m.vertices.len()).sum();
        let total_triangles: usize = meshes.iter().map(|m| m.triangles.len()).sum();

        let vertex_bytes = total_vertices.max(1) * std::mem::size_of::<ModelVertex>();
        let index_bytes = total_triangles.max(1) * std::mem::size_of::<[u16; 3]>();

        let vertices = backend.create_buffer(BufferKind::Vertex, vertex_bytes as u64)?;
        let indices = match backend.create_buffer(BufferKind::Index, index_bytes as u64) {
            Ok(b) => b,
            Err(e) => {
                backend.destroy_buffer(vertices);
                return Err(e.into());
            }
        };

        log::trace!(
            "compiled geometry: {} meshes, {total_vertices} vertices, {total_triangles} triangles",
            meshes.len()
        );
        Ok(Self {
            meshes: infos,
            vertices,
            indices,
        })
    }

    /// Repacks every mesh into the flat buffers and uploads them. Indices are rebased
    /// onto each mesh's first vertex and must stay within their own mesh.
    pub fn change<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        meshes: &[Mesh],
    ) -> Result<(), DisplayError> {
        if !same_topology(&self.meshes, meshes) {
            log::error!("compiled geometry changed shape without being reallocated");
            return Err(DisplayError::GeometryLayoutChanged);
        }
        check_indices(meshes)?;

        let mut vertices = Vec::new();
        let mut indices: Vec<u16> = Vec::new();
        for (info, mesh) in self.meshes.iter().zip(meshes) {
            vertices.extend_from_slice(&mesh.vertices);
            let base = info.vertex_start as u16;
            indices.extend(mesh.triangles.iter().flatten().map(|&i| base + i));
        }

        if !vertices.is_empty() {
            backend.write_buffer(self.vertices, 0, bytemuck::cast_slice(&vertices));
        }
        if !indices.is_empty() {
            backend.write_buffer(self.indices, 0, bytemuck::cast_slice(&indices));
        }
        Ok(())
    }

    /// Reallocates only if the mesh shapes changed, then uploads.
    pub fn set<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        meshes: &[Mesh],
    ) -> Result<(), DisplayError> {
        if !same_topology(&self.meshes, meshes) {
            let fresh = Self::allocate(backend, meshes)?;
            let old = std::mem::replace(self, fresh);
            old.release(backend);
        }
        self.change(backend, meshes)
    }

    pub fn mesh(&self, index: usize) -> Result<&MeshInfo, DisplayError> {
        self.meshes.get(index).ok_or(DisplayError::MeshOutOfRange {
            index,
            count: self.meshes.len(),
        })
    }

    pub fn meshes(&self) -> &[MeshInfo] {
        &self.meshes
    }

    pub fn buffers(&self) -> (BackendBuffer, BackendBuffer) {
        (self.vertices, self.indices)
    }

    pub fn release<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_buffer(self.vertices);
        backend.destroy_buffer(self.indices);
    }
}

fn check_indices(meshes: &[Mesh]) -> Result<(), DisplayError> {
    for (n, mesh) in meshes.iter().enumerate() {
        let vertex_count = mesh.vertices.len();
        if let Some(&index) = mesh
            .triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
        {
            log::error!("mesh {n} references vertex {index} of {vertex_count}");
            return Err(DisplayError::VertexIndexOutOfRange {
                mesh: n,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}
