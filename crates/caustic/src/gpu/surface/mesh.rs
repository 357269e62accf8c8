//! Projection grid for the caustic pass.

use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CausticVertex {
    pub position: [f32; 4],
    pub uv: [f32; 2],
}

impl CausticVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CausticVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Vertices and indices of a `cells_x` x `cells_y` grid spanning [-1, 1]².
///
/// UV (0, 0) is the top-left corner, i.e. position (-1, 1).
pub fn build_grid(cells_x: u32, cells_y: u32) -> (Vec<CausticVertex>, Vec<u32>) {
    let sx = cells_x.max(1);
    let sy = cells_y.max(1);

    let mut vertices = Vec::with_capacity(((sx + 1) * (sy + 1)) as usize);
    for y in 0..=sy {
        let v = y as f32 / sy as f32;
        for x in 0..=sx {
            let u = x as f32 / sx as f32;
            vertices.push(CausticVertex {
                position: [-1.0 + 2.0 * u, 1.0 - 2.0 * v, 0.0, 1.0],
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((sx * sy * 6) as usize);
    for y in 0..sy {
        for x in 0..sx {
            let a = y * (sx + 1) + x;
            let b = a + sx + 1;
            let c = a + sx + 2;
            let d = a + 1;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }

    (vertices, indices)
}

/// Uploaded projection grid.
pub struct CausticGridMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl CausticGridMesh {
    pub fn new(device: &wgpu::Device, cells_x: u32, cells_y: u32) -> Self {
        let (vertices, indices) = build_grid(cells_x, cells_y);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Caustic Grid Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Caustic Grid Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: indices.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_layout() {
        let (vertices, indices) = build_grid(1, 1);
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 2, 3, 0, 3, 1]);
        assert_eq!(vertices[0].position, [-1.0, 1.0, 0.0, 1.0]);
        assert_eq!(vertices[0].uv, [0.0, 0.0]);
        assert_eq!(vertices[3].position, [1.0, -1.0, 0.0, 1.0]);
        assert_eq!(vertices[3].uv, [1.0, 1.0]);
    }

    #[test]
    fn test_grid_counts_and_bounds() {
        let (vertices, indices) = build_grid(34, 20);
        assert_eq!(vertices.len(), 35 * 21);
        assert_eq!(indices.len(), 34 * 20 * 6);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        for v in &vertices {
            assert!(v.position[0] >= -1.0 && v.position[0] <= 1.0);
            assert!(v.position[1] >= -1.0 && v.position[1] <= 1.0);
        }
    }

    #[test]
    fn test_zero_cells_fall_back_to_quad() {
        let (vertices, _) = build_grid(0, 0);
        assert_eq!(vertices.len(), 4);
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = CausticVertex::desc();
        assert_eq!(layout.array_stride, 24);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[0].format, wgpu::VertexFormat::Float32x4);
        assert_eq!(layout.attributes[1].offset, 16);
        assert_eq!(layout.attributes[1].shader_location, 1);
        assert_eq!(layout.attributes[1].format, wgpu::VertexFormat::Float32x2);
    }
}
