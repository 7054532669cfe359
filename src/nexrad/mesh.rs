//! Radial fan geometry for a sweep.
//!
//! The mesh is a strip of (near, far) vertex pairs, one pair per ray edge.
//! Pair `i` sits on the left edge of ray `i`; the extra closing pair sits on
//! the right edge of the last ray so the fan closes without a seam.
//! Positions are metres relative to the radar site: x east, y north, z up.

use super::model::Sweep;
use glam::{Vec2, Vec3};

/// Tunables for mesh generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshOptions {
    /// Constant Z of the near edge, keeps it off the terrain surface
    pub near_height: f32,
    /// Subtracted from every v coordinate
    pub v_bias: f32,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            near_height: 2.0,
            v_bias: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

/// Triangle mesh covering a full sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadialMesh {
    /// Interleaved pairs: `2 * i` is near, `2 * i + 1` is far
    pub vertices: Vec<MeshVertex>,
    /// Two triangles per ray
    pub indices: Vec<u32>,
    /// Edge angle of each pair in degrees
    pub edge_angles: Vec<f32>,
}

impl RadialMesh {
    /// Builds the fan for `sweep`. An empty sweep yields an empty mesh.
    pub fn build(sweep: &Sweep, options: &MeshOptions) -> Self {
        let rays = &sweep.rays;
        let Some(last) = rays.last() else {
            return Self::default();
        };
        let count = rays.len();

        let mut mesh = Self {
            vertices: Vec::with_capacity((count + 1) * 2),
            indices: Vec::with_capacity(count * 6),
            edge_angles: Vec::with_capacity(count + 1),
        };

        for i in 0..=count {
            let (ray, angle) = if i < count {
                let ray = &rays[i];
                (ray, ray.azimuth - ray.beam_width / 2.0)
            } else {
                (last, last.azimuth + last.beam_width / 2.0)
            };

            let rad = angle.to_radians();
            let (sin_a, cos_a) = rad.sin_cos();
            let near = ray.first_gate_m;
            let far = ray.far_range_m();
            let v = i as f32 / count as f32 - options.v_bias;

            mesh.vertices.push(MeshVertex {
                position: Vec3::new(sin_a * near, cos_a * near, options.near_height),
                uv: Vec2::new(0.0, v),
            });
            mesh.vertices.push(MeshVertex {
                position: Vec3::new(
                    sin_a * far,
                    cos_a * far,
                    ray.elevation.to_radians().sin() * far,
                ),
                uv: Vec2::new(1.0, v),
            });
            mesh.edge_angles.push(angle);
        }

        for i in 0..count as u32 {
            let (near, far) = (2 * i, 2 * i + 1);
            let (next_near, next_far) = (2 * i + 2, 2 * i + 3);
            mesh.indices
                .extend_from_slice(&[near, far, next_far, near, next_far, next_near]);
        }

        mesh
    }

    /// Number of (near, far) vertex pairs.
    pub fn pair_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Largest horizontal distance of any vertex from the site.
    pub fn radius_m(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.position.truncate().length())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nexrad::model::Ray;

    fn full_sweep(rays: usize, elevation: f32) -> Sweep {
        let width = 360.0 / rays as f32;
        Sweep::new(
            elevation,
            (0..rays)
                .map(|i| Ray {
                    azimuth: width * (i as f32 + 0.5),
                    beam_width: width,
                    first_gate_m: 2000.0,
                    gate_size_m: 250.0,
                    elevation,
                    bins: vec![20; 400],
                })
                .collect(),
        )
    }

    #[test]
    fn test_pair_count() {
        for rays in [1, 3, 360, 720] {
            let mesh = RadialMesh::build(&full_sweep(rays, 0.5), &MeshOptions::default());
            assert_eq!(mesh.pair_count(), rays + 1);
            assert_eq!(mesh.indices.len(), rays * 6);
            let n = mesh.vertices.len();
            assert!(mesh.indices.iter().all(|&i| (i as usize) < n));
        }
    }

    #[test]
    fn test_fan_closes() {
        let mesh = RadialMesh::build(&full_sweep(360, 0.5), &MeshOptions::default());
        let first = mesh.edge_angles[0];
        let last = *mesh.edge_angles.last().unwrap();
        let diff = (last - first).rem_euclid(360.0);
        assert!(diff.min(360.0 - diff) < 1e-3);

        let a = mesh.vertices[1].position;
        let b = mesh.vertices[mesh.vertices.len() - 1].position;
        assert!((a - b).length() < 0.5, "{a} vs {b}");
    }

    #[test]
    fn test_heights_and_uv() {
        let options = MeshOptions {
            near_height: 5.0,
            v_bias: 0.01,
        };
        let sweep = full_sweep(4, 30.0);
        let mesh = RadialMesh::build(&sweep, &options);

        let near = mesh.vertices[0];
        let far = mesh.vertices[1];
        assert_eq!(near.position.z, 5.0);
        let far_range = 2000.0 + 400.0 * 250.0;
        assert!((far.position.z - far_range * 0.5).abs() < 1.0);
        assert!((far.position.truncate().length() - far_range).abs() < 1.0);

        assert_eq!(near.uv, Vec2::new(0.0, -0.01));
        assert_eq!(far.uv.x, 1.0);
        let closing = mesh.vertices[8];
        assert!((closing.uv.y - 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_no_degenerate_triangles() {
        let mesh = RadialMesh::build(&full_sweep(360, 0.5), &MeshOptions::default());
        for tri in mesh.indices.chunks(3) {
            let a = mesh.vertices[tri[0] as usize].position.truncate();
            let b = mesh.vertices[tri[1] as usize].position.truncate();
            let c = mesh.vertices[tri[2] as usize].position.truncate();
            let area = (b - a).perp_dot(c - a).abs() / 2.0;
            assert!(area > 0.0);
        }
    }

    #[test]
    fn test_empty_sweep() {
        let mesh = RadialMesh::build(&Sweep::default(), &MeshOptions::default());
        assert!(mesh.is_empty());
        assert_eq!(mesh.radius_m(), 0.0);
    }
}
