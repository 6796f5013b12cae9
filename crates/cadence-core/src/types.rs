//! Geometry types.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex layout consumed by the demo pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
}

impl Vertex {
    /// Create a new vertex.
    #[inline]
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }
}

/// Indexed triangle mesh staged on the host.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl Mesh {
    /// Unit cube centered at the origin with one flat color per face.
    ///
    /// Triangles wind counter-clockwise when viewed from outside.
    pub fn cube() -> Self {
        // (normal, u, v) with u x v == normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z, [0.9, 0.2, 0.2]),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y, [0.2, 0.9, 0.9]),
            (Vec3::Y, Vec3::Z, Vec3::X, [0.2, 0.9, 0.2]),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z, [0.9, 0.2, 0.9]),
            (Vec3::Z, Vec3::X, Vec3::Y, [0.2, 0.2, 0.9]),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X, [0.9, 0.9, 0.2]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u, v, color) in faces {
            let base = vertices.len() as u16;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let corner = (normal + u * su + v * sv) * 0.5;
                vertices.push(Vertex::new(corner.to_array(), color));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    /// Vertex data as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn cube_counts() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
        assert_eq!(cube.vertex_bytes().len(), 24 * 24);
        assert_eq!(cube.index_bytes().len(), 36 * 2);
    }

    #[test]
    fn cube_winds_outward() {
        let cube = Mesh::cube();
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(cube.vertices[i as usize].position));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "triangle {tri:?} faces inward");
        }
    }
}
