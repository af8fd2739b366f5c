//! PolygonBuilder — triangle fan из упорядоченной последовательности лучей
//!
//! Vertex 0 — локальный origin сенсора, далее концы лучей в локальном пространстве.
//! UV: локальная вершина × world scale, [-radius, radius] → [0, 1] по X/Z (центр 0.5),
//! чтобы материал мог считать world-space дистанцию от центра.

use bevy::prelude::*;

use super::ray_cast::{RayBuffer, SensorPose};

const UV_MIDDLE: f32 = 0.5;

/// Polygon output сенсора (потребляется renderer'ом хоста)
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ConeMesh {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    uvs: Vec<Vec2>,
}

impl ConeMesh {
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.uvs.clear();
    }

    /// Пересобирает fan из лучей текущего tick (буферы переиспользуются)
    pub fn build(&mut self, rays: &RayBuffer, pose: &SensorPose, radius: f32) {
        self.clear();

        self.vertices.push(Vec3::ZERO);
        self.vertices.extend(rays.ordered().map(|ray| pose.to_local(ray.end_point)));

        let vertex_count = self.vertices.len() as u32;
        for i in 0..vertex_count.saturating_sub(2) {
            self.indices.extend_from_slice(&[0, i + 1, i + 2]);
        }

        let double_radius = radius * 2.0;
        let scale = pose.scale;

        self.uvs.extend(self.vertices.iter().map(|vertex| {
            if double_radius <= f32::EPSILON {
                return Vec2::splat(UV_MIDDLE);
            }

            let scaled = *vertex * scale;
            Vec2::new(
                scaled.x / double_radius + UV_MIDDLE,
                scaled.z / double_radius + UV_MIDDLE,
            )
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldOfViewConfig;
    use crate::scene::PrimitiveScene;
    use crate::sensor::cone_sampler::{sweep_cone, SweepShape};
    use crate::sensor::ray_cast::SweepContext;
    use crate::sensor::test_support::sweep_context;

    fn swept(ctx: &SweepContext<'_>, angle: u32) -> RayBuffer {
        let mut buffer = RayBuffer::default();
        sweep_cone(
            &mut buffer,
            ctx,
            SweepShape {
                center: 0.0,
                angle,
                resolution: 1.0,
                accuracy: 5,
            },
        );
        buffer
    }

    #[test]
    fn test_fan_topology() {
        let scene = PrimitiveScene::default();
        let table = FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 3.0);
        let buffer = swept(&ctx, 10);

        let mut mesh = ConeMesh::default();
        mesh.build(&buffer, &ctx.pose, 3.0);

        assert_eq!(mesh.vertex_count(), buffer.ordered_len() + 1);
        assert_eq!(mesh.triangle_count(), buffer.ordered_len() - 1);
        assert_eq!(mesh.vertices()[0], Vec3::ZERO);
        assert_eq!(&mesh.indices()[..6], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.uvs().len(), mesh.vertex_count());
        assert_eq!(mesh.uvs()[0], Vec2::splat(0.5));
    }

    #[test]
    fn test_uv_maps_radius_to_unit_square() {
        let scene = PrimitiveScene::default();
        let table = FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 3.0);
        let buffer = swept(&ctx, 90);

        let mut mesh = ConeMesh::default();
        mesh.build(&buffer, &ctx.pose, 3.0);

        // Луч -45° ... +45°: средний луч (0°) смотрит вдоль +Z на всю длину
        let middle = mesh.uvs()[1 + 45];
        assert!((middle - Vec2::new(0.5, 1.0)).length() < 1e-4);
        assert!(mesh.uvs().iter().all(|uv| (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y)));
    }

    #[test]
    fn test_uv_uses_world_scale() {
        let scene = PrimitiveScene::default();
        let table = FieldOfViewConfig::default().transparency_table();
        let ctx = SweepContext {
            pose: SensorPose::new(Vec3::new(4.0, 0.0, -2.0), Quat::IDENTITY, Vec3::splat(2.0)),
            ..sweep_context(&scene, &table, 3.0)
        };
        let buffer = swept(&ctx, 2);

        let mut mesh = ConeMesh::default();
        mesh.build(&buffer, &ctx.pose, 3.0);

        // Мир: конец луча на дистанции 3; локально 1.5; UV снова по world дистанции
        let forward = mesh.vertices()[2];
        assert!((forward - Vec3::new(0.0, 0.0, 1.5)).length() < 1e-4);
        assert!((mesh.uvs()[2] - Vec2::new(0.5, 1.0)).length() < 1e-4);
    }

    #[test]
    fn test_zero_radius_is_centered() {
        let scene = PrimitiveScene::default();
        let table = FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 0.0);
        let buffer = swept(&ctx, 10);

        let mut mesh = ConeMesh::default();
        mesh.build(&buffer, &ctx.pose, 0.0);
        assert!(mesh.uvs().iter().all(|uv| *uv == Vec2::splat(0.5)));
    }

    #[test]
    fn test_clear() {
        let scene = PrimitiveScene::default();
        let table = FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 3.0);
        let buffer = swept(&ctx, 10);

        let mut mesh = ConeMesh::default();
        mesh.build(&buffer, &ctx.pose, 3.0);
        mesh.clear();

        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }
}
