//! RayCaster — 'умный' луч: длина зависит от прозрачности пробитых препятствий
//!
//! Все результаты одного tick живут в `RayBuffer` (arena на инстанс сенсора):
//! лучи — индексы в заранее выделенном буфере, discovered targets — срезы общего пула.

use bevy::prelude::*;

use crate::config::TransparencyTable;
use crate::logger;
use crate::scene::{RayHit, SceneQuery};

/// Поза сенсора в мире на текущий tick
///
/// Локальный фрейм: +Z — направление взгляда (угол 0°), +X — угол +90°.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPose {
    pub origin: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl SensorPose {
    pub fn new(origin: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            origin,
            rotation,
            scale,
        }
    }

    /// Направление луча (мир) для угла в градусах относительно взгляда
    pub fn direction(&self, angle: f32) -> Vec3 {
        self.rotation * local_direction(angle)
    }

    /// Мир → локальный фрейм сенсора (с учётом scale)
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        let unrotated = self.rotation.inverse() * (point - self.origin);

        // Нулевой scale заменяем на ε, знак (зеркальный scale) сохраняем
        let scale = self.scale.map(|axis| {
            if axis.abs() < f32::EPSILON {
                f32::EPSILON.copysign(axis)
            } else {
                axis
            }
        });
        unrotated / scale
    }
}

impl From<&Transform> for SensorPose {
    fn from(transform: &Transform) -> Self {
        Self::new(transform.translation, transform.rotation, transform.scale)
    }
}

pub fn local_direction(angle: f32) -> Vec3 {
    let radians = angle.to_radians();
    Vec3::new(radians.sin(), 0.0, radians.cos())
}

/// Результат одного луча (immutable после создания)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastResult {
    /// Угол относительно взгляда (градусы)
    pub angle: f32,
    /// Эффективная длина с учётом препятствий
    pub length: f32,
    pub end_point: Vec3,
    /// Число достигнутых (не отсечённых) попаданий, без собственного тела
    pub obstacle_hits: u32,
    discovered_start: usize,
    discovered_end: usize,
}

impl RayCastResult {
    /// Цели, пробитые этим лучом: (entity, distance от центра)
    pub fn discovered<'a>(&self, buffer: &'a RayBuffer) -> &'a [(Entity, f32)] {
        &buffer.discoveries[self.discovered_start..self.discovered_end]
    }
}

/// Вид debug-ребра (для gizmo слоя хоста)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum EdgeKind {
    /// Граница базового сектора
    Sector,
    /// Найденная граница подсектора со стороны начального луча
    SubsegmentStart,
    /// Найденная граница подсектора со стороны конечного луча
    SubsegmentEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugEdge {
    pub from: Vec3,
    pub to: Vec3,
    pub kind: EdgeKind,
}

/// Всё, что нужно лучу кроме угла (собирается один раз на tick)
pub struct SweepContext<'a> {
    pub pose: SensorPose,
    pub radius: f32,
    pub targets_layer: u32,
    pub transparency: &'a TransparencyTable,
    pub scene: &'a dyn SceneQuery,
    /// true для коллайдеров собственной иерархии (всё под общим корнем `ChildOf`)
    pub is_own: &'a dyn Fn(Entity) -> bool,
    pub record_edges: bool,
}

/// Per-instance arena лучей текущего tick
///
/// Очищается в начале каждого tick, capacity сохраняется между tick'ами.
#[derive(Component, Debug, Default)]
pub struct RayBuffer {
    rays: Vec<RayCastResult>,
    discoveries: Vec<(Entity, f32)>,
    /// Упорядоченная по углу последовательность (индексы в `rays`)
    order: Vec<usize>,
    /// Ближайшая дистанция на entity по всему sweep (порядок первого обнаружения)
    nearest: Vec<(Entity, f32)>,
    hits: Vec<RayHit>,
    edges: Vec<DebugEdge>,
    /// Scratch для EdgeRefiner: work stack (start, end, depth) и найденные лучи
    pub(super) refine_stack: Vec<(usize, usize, u32)>,
    pub(super) refined: Vec<usize>,
}

impl RayBuffer {
    pub fn clear(&mut self) {
        self.rays.clear();
        self.discoveries.clear();
        self.order.clear();
        self.nearest.clear();
        self.hits.clear();
        self.edges.clear();
        self.refine_stack.clear();
        self.refined.clear();
    }

    pub fn ray(&self, index: usize) -> &RayCastResult {
        &self.rays[index]
    }

    /// Всего выпущено лучей в этом tick (включая refinement)
    pub fn cast_count(&self) -> usize {
        self.rays.len()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Упорядоченная по углу последовательность лучей tick'а
    pub fn ordered(&self) -> impl Iterator<Item = &RayCastResult> + '_ {
        self.order.iter().map(move |&index| &self.rays[index])
    }

    pub fn ordered_len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn push_ordered(&mut self, index: usize) {
        self.order.push(index);
    }

    pub fn debug_edges(&self) -> &[DebugEdge] {
        &self.edges
    }

    pub(crate) fn record_edge(&mut self, ctx: &SweepContext<'_>, index: usize, kind: EdgeKind) {
        if ctx.record_edges {
            let to = self.rays[index].end_point;
            self.edges.push(DebugEdge {
                from: ctx.pose.origin,
                to,
                kind,
            });
        }
    }

    /// Максимальная длина луча = текущий reach конуса (0 если лучей нет)
    pub fn max_length(&self) -> f32 {
        self.ordered().map(|ray| ray.length).fold(0.0, f32::max)
    }

    /// Ближайшие дистанции на entity (после `reduce_discoveries`)
    pub fn nearest_discoveries(&self) -> &[(Entity, f32)] {
        &self.nearest
    }

    /// Сворачивает discovered targets всех лучей в ближайшую дистанцию на entity
    pub fn reduce_discoveries(&mut self) {
        self.nearest.clear();

        for &index in &self.order {
            let ray = &self.rays[index];
            for &(entity, distance) in &self.discoveries[ray.discovered_start..ray.discovered_end] {
                match self.nearest.iter_mut().find(|(known, _)| *known == entity) {
                    Some((_, nearest)) => *nearest = nearest.min(distance),
                    None => self.nearest.push((entity, distance)),
                }
            }
        }
    }

    /// Выпускает один луч под углом `angle`, возвращает индекс результата
    pub fn cast(&mut self, ctx: &SweepContext<'_>, angle: f32) -> usize {
        let direction = ctx.pose.direction(angle);

        if let Err(error) = ctx.scene.cast_ray(ctx.pose.origin, direction, ctx.radius, &mut self.hits) {
            // Сбой адаптера = 'нет попаданий', tick не прерываем
            logger::log_warning(&format!("FieldOfView: ray at {:.2}° degraded to no hits: {}", angle, error));
            self.hits.clear();
        }

        let discovered_start = self.discoveries.len();
        let mut ray_length = ctx.radius;
        let mut obstacle_hits = 0;

        for hit in &self.hits {
            // Луч уже короче следующего попадания — дальше ничего не достижимо
            if ray_length < hit.distance {
                break;
            }

            if (ctx.is_own)(hit.owner) {
                continue;
            }

            obstacle_hits += 1;

            if hit.layers & ctx.targets_layer != 0 {
                let already_found = self.discoveries[discovered_start..]
                    .iter()
                    .any(|(entity, _)| *entity == hit.owner);
                if !already_found {
                    self.discoveries.push((hit.owner, hit.distance));
                }
            }

            if let Some(transparency) = ctx.transparency.resolve(hit.layers) {
                let remaining = ray_length - hit.distance;
                let invisible = remaining * f32::from(100 - transparency) / 100.0;
                ray_length -= invisible;
            }
        }

        let index = self.rays.len();
        self.rays.push(RayCastResult {
            angle,
            length: ray_length,
            end_point: ctx.pose.origin + direction * ray_length,
            obstacle_hits,
            discovered_start,
            discovered_end: self.discoveries.len(),
        });

        index
    }
}
