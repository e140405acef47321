//! Static geometry shared by the instanced layers.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Face normal followed by the two in-plane axes, ordered so `u x v == n`
/// and triangles wind counter-clockwise seen from outside.
const BOX_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

/// Axis-aligned box centred on the origin.
pub fn box_mesh(size: [f32; 3]) -> Mesh {
    let mut mesh = Mesh {
        vertices: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };
    for (normal, u, v) in BOX_FACES {
        let base = mesh.vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = std::array::from_fn(|axis| {
                (normal[axis] + u[axis] * su + v[axis] * sv) * 0.5 * size[axis]
            });
            mesh.vertices.push(MeshVertex {
                position,
                normal,
                uv: [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
            });
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Subdivided plane in the XY plane facing +Z. `uv` is `(0, 0)` at the
/// bottom-left corner.
pub fn plane_mesh(width: f32, height: f32, segments_x: u32, segments_y: u32) -> Mesh {
    let segments_x = segments_x.max(1);
    let segments_y = segments_y.max(1);
    let stride = segments_x + 1;
    let mut mesh = Mesh {
        vertices: Vec::with_capacity((stride * (segments_y + 1)) as usize),
        indices: Vec::with_capacity((segments_x * segments_y * 6) as usize),
    };
    for j in 0..=segments_y {
        for i in 0..=segments_x {
            let u = i as f32 / segments_x as f32;
            let v = j as f32 / segments_y as f32;
            mesh.vertices.push(MeshVertex {
                position: [(u - 0.5) * width, (v - 0.5) * height, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [u, v],
            });
        }
    }
    for j in 0..segments_y {
        for i in 0..segments_x {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            mesh.indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn assert_outward_winding(mesh: &Mesh) {
        for triangle in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.vertices[triangle[k] as usize]);
            let face = cross(sub(b.position, a.position), sub(c.position, a.position));
            let facing: f32 = (0..3).map(|axis| face[axis] * a.normal[axis]).sum();
            assert!(facing > 0.0, "triangle {triangle:?} winds inward");
        }
    }

    #[test]
    fn voxel_box_has_expected_extent() {
        let mesh = box_mesh([0.36, 0.36, 2.76]);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.index_count(), 36);
        for vertex in &mesh.vertices {
            assert!((vertex.position[0].abs() - 0.18).abs() < 1e-6);
            assert!((vertex.position[2].abs() - 1.38).abs() < 1e-6);
        }
        assert_outward_winding(&mesh);
    }

    #[test]
    fn plane_is_subdivided_and_centred() {
        let mesh = plane_mesh(24.0, 15.6, 100, 100);
        assert_eq!(mesh.vertices.len(), 101 * 101);
        assert_eq!(mesh.indices.len(), 100 * 100 * 6);
        let first = mesh.vertices[0];
        let last = mesh.vertices[mesh.vertices.len() - 1];
        assert_eq!(first.position[..2], [-12.0, -7.8]);
        assert_eq!(first.uv, [0.0, 0.0]);
        assert_eq!(last.uv, [1.0, 1.0]);
        assert_outward_winding(&mesh);
    }
}
