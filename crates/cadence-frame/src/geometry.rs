//! Device-local geometry buffer layout and staging.

use cadence_core::Mesh;
use cadence_gpu::{GpuError, HostBuffer, Result};
use ash::vk;

/// Round `value` up to a multiple of `alignment`.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Size in bytes of one index.
pub const fn index_size(index_type: vk::IndexType) -> u64 {
    match index_type {
        vk::IndexType::UINT16 => 2,
        _ => 4,
    }
}

/// Offsets of vertex and index data inside one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryLayout {
    pub vertex_offset: u64,
    pub vertex_bytes: u64,
    pub index_offset: u64,
    pub index_count: u32,
    pub index_type: vk::IndexType,
}

impl GeometryLayout {
    /// Vertices at offset 0, indices right after them at index alignment.
    pub fn packed(vertex_bytes: u64, index_count: u32, index_type: vk::IndexType) -> Self {
        Self {
            vertex_offset: 0,
            vertex_bytes,
            index_offset: align_up(vertex_bytes, index_size(index_type)),
            index_count,
            index_type,
        }
    }

    /// Layout for a 16-bit indexed mesh.
    pub fn for_mesh(mesh: &Mesh) -> Self {
        Self::packed(
            mesh.vertex_bytes().len() as u64,
            mesh.indices.len() as u32,
            vk::IndexType::UINT16,
        )
    }

    pub fn index_bytes(&self) -> u64 {
        u64::from(self.index_count) * index_size(self.index_type)
    }

    /// Total buffer size required.
    pub fn total_size(&self) -> u64 {
        self.index_offset + self.index_bytes()
    }

    /// Copy regions moving a staging buffer with the same layout into place.
    pub fn copy_regions(&self) -> [vk::BufferCopy; 2] {
        [
            vk::BufferCopy {
                src_offset: self.vertex_offset,
                dst_offset: self.vertex_offset,
                size: self.vertex_bytes,
            },
            vk::BufferCopy {
                src_offset: self.index_offset,
                dst_offset: self.index_offset,
                size: self.index_bytes(),
            },
        ]
    }

    /// Write vertex and index bytes into a staging buffer at this layout.
    pub fn write_staged<B: HostBuffer>(
        &self,
        staging: &B,
        vertex_bytes: &[u8],
        index_bytes: &[u8],
    ) -> Result<()> {
        if vertex_bytes.len() as u64 != self.vertex_bytes
            || index_bytes.len() as u64 != self.index_bytes()
        {
            return Err(GpuError::InvalidState(format!(
                "geometry data ({} + {} bytes) does not match layout ({} + {} bytes)",
                vertex_bytes.len(),
                index_bytes.len(),
                self.vertex_bytes,
                self.index_bytes()
            )));
        }
        staging.write_bytes(self.vertex_offset, vertex_bytes)?;
        staging.write_bytes(self.index_offset, index_bytes)
    }
}

/// Geometry buffer handle and its layout, shared by every frame.
#[derive(Clone, Copy, Debug)]
pub struct GeometryBuffer {
    pub buffer: vk::Buffer,
    pub layout: GeometryLayout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGpu;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(192, 64), 192);
        assert_eq!(align_up(193, 64), 256);
        assert_eq!(align_up(7, 0), 7);
    }

    #[test]
    fn cube_layout() {
        let mesh = Mesh::cube();
        let layout = GeometryLayout::for_mesh(&mesh);
        assert_eq!(layout.vertex_bytes, 24 * 24);
        assert_eq!(layout.index_offset, 576);
        assert_eq!(layout.index_count, 36);
        assert_eq!(layout.total_size(), 576 + 72);

        let [vertices, indices] = layout.copy_regions();
        assert_eq!((vertices.dst_offset, vertices.size), (0, 576));
        assert_eq!((indices.src_offset, indices.size), (576, 72));
    }

    #[test]
    fn index_offset_respects_index_size() {
        let layout = GeometryLayout::packed(30, 3, vk::IndexType::UINT32);
        assert_eq!(layout.index_offset, 32);
        assert_eq!(layout.total_size(), 44);
    }

    #[test]
    fn staging_write_places_both_ranges() {
        let gpu = MockGpu::new(2);
        let mesh = Mesh::cube();
        let layout = GeometryLayout::for_mesh(&mesh);
        let staging = gpu.buffer(layout.total_size() as usize);

        layout
            .write_staged(&staging, mesh.vertex_bytes(), mesh.index_bytes())
            .unwrap();
        assert_eq!(staging.writes(), vec![(0, 576), (576, 72)]);
        assert_eq!(staging.bytes(576, 72), mesh.index_bytes());

        let mismatch = layout.write_staged(&staging, &[0; 4], mesh.index_bytes());
        assert!(mismatch.is_err());
    }
}
