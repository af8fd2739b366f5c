//! PrimitiveScene — reference адаптер на аналитических 2D коллайдерах
//!
//! Сенсор планарный (локальная горизонтальная плоскость), поэтому коллайдеры
//! живут в плоскости XZ: круги (акторы, колонны) и повернутые прямоугольники (стены).
//! Пересобирается каждый tick из entities с `SceneCollider` + `Transform`.

use bevy::prelude::*;

use super::{world_transform, RayHit, SceneQuery, SceneQueryError};

/// Минимальная длина направления в плоскости XZ
const MIN_PLANAR_DIRECTION: f32 = 1e-6;

/// Форма коллайдера в плоскости XZ
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum ColliderShape {
    /// Круг радиуса `radius` вокруг translation
    Circle { radius: f32 },
    /// Прямоугольник (half extents по локальным X/Z), поворот берётся из Transform
    Rect { half_extents: Vec2 },
}

/// Компонент: entity участвует в ray-запросах сенсоров
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SceneCollider {
    pub shape: ColliderShape,
    /// Категории коллайдера (см. `LAYER_*`)
    pub layers: u32,
}

impl SceneCollider {
    pub fn circle(radius: f32, layers: u32) -> Self {
        Self {
            shape: ColliderShape::Circle { radius },
            layers,
        }
    }

    pub fn rect(half_extents: Vec2, layers: u32) -> Self {
        Self {
            shape: ColliderShape::Rect { half_extents },
            layers,
        }
    }
}

#[derive(Debug, Clone)]
struct PlacedCollider {
    owner: Entity,
    center: Vec2,
    /// Поворот мир → локальный фрейм (только для Rect)
    inverse_rotation: Quat,
    shape: ColliderShape,
    layers: u32,
}

/// Снимок сцены на текущий tick
#[derive(Resource, Debug, Clone, Default)]
pub struct PrimitiveScene {
    colliders: Vec<PlacedCollider>,
}

impl PrimitiveScene {
    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn insert(&mut self, owner: Entity, transform: &Transform, collider: &SceneCollider) {
        self.colliders.push(PlacedCollider {
            owner,
            center: planar(transform.translation),
            inverse_rotation: transform.rotation.inverse(),
            shape: collider.shape,
            layers: collider.layers,
        });
    }

    /// Entry distance луча до коллайдера (None = промах или origin внутри)
    fn entry_distance(&self, collider: &PlacedCollider, origin: Vec2, direction: Vec2) -> Option<f32> {
        match collider.shape {
            ColliderShape::Circle { radius } => ray_circle(origin, direction, collider.center, radius),
            ColliderShape::Rect { half_extents } => {
                // Переводим луч в локальный фрейм прямоугольника
                let offset = origin - collider.center;
                let local_origin = collider.inverse_rotation * Vec3::new(offset.x, 0.0, offset.y);
                let local_direction = collider.inverse_rotation * Vec3::new(direction.x, 0.0, direction.y);

                ray_rect(planar(local_origin), planar(local_direction), half_extents)
            }
        }
    }
}

impl SceneQuery for PrimitiveScene {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        hits: &mut Vec<RayHit>,
    ) -> Result<(), SceneQueryError> {
        hits.clear();

        let planar_direction = planar(direction);
        if planar_direction.length_squared() < MIN_PLANAR_DIRECTION {
            return Err(SceneQueryError::DegenerateDirection(direction));
        }
        let planar_direction = planar_direction.normalize();
        let planar_origin = planar(origin);

        for collider in &self.colliders {
            let Some(distance) = self.entry_distance(collider, planar_origin, planar_direction) else {
                continue;
            };

            if distance <= max_distance {
                hits.push(RayHit {
                    distance,
                    layers: collider.layers,
                    owner: collider.owner,
                });
            }
        }

        // Stable sort: равные дистанции сохраняют порядок вставки
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(())
    }
}

/// Система: пересборка PrimitiveScene из ECS (первая в FixedUpdate цепочке сенсора)
pub fn rebuild_primitive_scene(
    mut scene: ResMut<PrimitiveScene>,
    colliders: Query<(Entity, &SceneCollider)>,
    transforms: Query<&Transform>,
    parents: Query<&ChildOf>,
) {
    scene.clear();

    for (entity, collider) in colliders.iter() {
        if let Some(transform) = world_transform(entity, &transforms, &parents) {
            scene.insert(entity, &transform, collider);
        }
    }
}

fn planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Ray vs circle. Direction нормализован.
fn ray_circle(origin: Vec2, direction: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let to_origin = origin - center;
    let c = to_origin.length_squared() - radius * radius;

    // Origin внутри круга — коллайдер не репортим
    if c <= 0.0 {
        return None;
    }

    let b = to_origin.dot(direction);
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let distance = -b - discriminant.sqrt();
    (distance >= 0.0).then_some(distance)
}

/// Ray vs axis-aligned rect (slab test) в локальном фрейме
fn ray_rect(origin: Vec2, direction: Vec2, half_extents: Vec2) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..2 {
        let o = origin[axis];
        let d = direction[axis];
        let extent = half_extents[axis];

        if d.abs() < f32::EPSILON {
            // Параллельно slab'у: промах если origin вне него
            if o < -extent || o > extent {
                return None;
            }
            continue;
        }

        let t1 = (-extent - o) / d;
        let t2 = (extent - o) / d;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
    }

    // t_min <= 0 = origin внутри или прямоугольник позади
    if t_min > 0.0 && t_min <= t_max {
        Some(t_min)
    } else {
        None
    }
}
