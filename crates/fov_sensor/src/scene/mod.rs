//! Geometry Query Adapter — контракт ray-vs-scene для сенсора
//!
//! Сенсор не знает, чем хост представляет геометрию (Rapier, Godot physics,
//! собственный BVH). Ему нужен только упорядоченный список пересечений луча.
//!
//! ## Layers (битовая маска категорий):
//! - Bit 0 (0b1 = 1): Default
//! - Bit 1 (0b10 = 2): Targets (акторы, которых сенсор ищет)
//! - Bit 2 (0b100 = 4): Obstacles (стены, непрозрачные препятствия)
//! - Bit 3 (0b1000 = 8): Glass (частично прозрачные препятствия)
//!
//! `LAYER_ALL` — "everything": используется как default запись в таблице прозрачности.

use bevy::prelude::*;
use thiserror::Error;

pub mod primitive;

pub use primitive::{rebuild_primitive_scene, ColliderShape, PrimitiveScene, SceneCollider};

/// Bit 0: Default
pub const LAYER_DEFAULT: u32 = 0b1;

/// Bit 1: Targets
pub const LAYER_TARGETS: u32 = 0b10;

/// Bit 2: Obstacles
pub const LAYER_OBSTACLES: u32 = 0b100;

/// Bit 3: Glass
pub const LAYER_GLASS: u32 = 0b1000;

/// Все категории ("everything")
pub const LAYER_ALL: u32 = u32::MAX;

/// Пустая маска ("nothing")
pub const LAYER_NONE: u32 = 0;

/// Одно пересечение луча со сценой
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Дистанция от origin луча
    pub distance: f32,
    /// Категории коллайдера (bitset)
    pub layers: u32,
    /// Entity-владелец коллайдера
    pub owner: Entity,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneQueryError {
    #[error("ray direction {0:?} has zero length in the sensing plane")]
    DegenerateDirection(Vec3),

    #[error("scene is not available: {0}")]
    Unavailable(String),
}

/// Ray-vs-scene запрос
///
/// Контракт:
/// - `hits` очищается и заполняется пересечениями с `distance <= max_distance`
/// - hits отсортированы по возрастанию distance
/// - адаптер должен быть thread-safe для read-only запросов (шардинг сенсоров)
pub trait SceneQuery: Send + Sync {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        hits: &mut Vec<RayHit>,
    ) -> Result<(), SceneQueryError>;
}

/// Предел глубины иерархии (защита от зацикленного `ChildOf`)
const MAX_HIERARCHY_DEPTH: usize = 64;

/// World transform entity: local, умноженный на всю цепочку `ChildOf` предков
///
/// Считается прямо из `Transform` в момент tick'а: в FixedUpdate `GlobalTransform`
/// отстаёт на кадр. Предок без `Transform` считается identity.
pub fn world_transform(
    entity: Entity,
    transforms: &Query<&Transform>,
    parents: &Query<&ChildOf>,
) -> Option<Transform> {
    let mut world = *transforms.get(entity).ok()?;
    let mut current = entity;

    for _ in 0..MAX_HIERARCHY_DEPTH {
        let Ok(child_of) = parents.get(current) else {
            break;
        };
        current = child_of.parent();

        if let Ok(parent) = transforms.get(current) {
            world = parent.mul_transform(world);
        }
    }

    Some(world)
}

/// Корень иерархии entity (сама entity, если родителя нет)
pub fn hierarchy_root(entity: Entity, parents: &Query<&ChildOf>) -> Entity {
    let mut current = entity;

    for _ in 0..MAX_HIERARCHY_DEPTH {
        match parents.get(current) {
            Ok(child_of) => current = child_of.parent(),
            Err(_) => break,
        }
    }

    current
}
