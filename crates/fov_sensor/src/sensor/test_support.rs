//! Общие helpers для unit тестов сенсора

use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::prelude::*;

use super::ray_cast::{SensorPose, SweepContext};
use crate::config::TransparencyTable;
use crate::scene::{RayHit, SceneQuery, SceneQueryError, LAYER_TARGETS};

/// Обёртка над сценой, считающая ray-запросы
pub struct CountingScene<S> {
    pub inner: S,
    casts: AtomicUsize,
}

impl<S> CountingScene<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            casts: AtomicUsize::new(0),
        }
    }

    pub fn casts(&self) -> usize {
        self.casts.load(Ordering::Relaxed)
    }
}

impl<S: SceneQuery> SceneQuery for CountingScene<S> {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        hits: &mut Vec<RayHit>,
    ) -> Result<(), SceneQueryError> {
        self.casts.fetch_add(1, Ordering::Relaxed);
        self.inner.cast_ray(origin, direction, max_distance, hits)
    }
}

/// Сцена, которая всегда падает
pub struct BrokenScene;

impl SceneQuery for BrokenScene {
    fn cast_ray(&self, _: Vec3, _: Vec3, _: f32, hits: &mut Vec<RayHit>) -> Result<(), SceneQueryError> {
        // Мусор в буфере не должен протечь в результат луча
        hits.push(RayHit {
            distance: 0.5,
            layers: u32::MAX,
            owner: Entity::from_raw(999),
        });
        Err(SceneQueryError::Unavailable("physics world is locked".into()))
    }
}

fn never_own(_: Entity) -> bool {
    false
}

/// Контекст сенсора в начале координат, взгляд вдоль +Z
pub fn sweep_context<'a>(
    scene: &'a dyn SceneQuery,
    transparency: &'a TransparencyTable,
    radius: f32,
) -> SweepContext<'a> {
    SweepContext {
        pose: SensorPose::new(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
        radius,
        targets_layer: LAYER_TARGETS,
        transparency,
        scene,
        is_own: &never_own,
        record_edges: true,
    }
}
