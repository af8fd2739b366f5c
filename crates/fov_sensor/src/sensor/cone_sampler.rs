//! ConeSampler — sweep конуса за один tick
//!
//! 1. Центр sweep'а: угол на ближайшую цель, иначе idle rotation pattern (или 0 на паузе)
//! 2. `max(1, angle × resolution)` секторов от `center - angle/2`
//! 3. Между соседними базовыми лучами — EdgeRefiner
//! 4. Итог — одна упорядоченная по углу последовательность в `RayBuffer`

use bevy::prelude::*;

use super::blender::SkinMode;
use super::edge_refiner::generate_subsegments;
use super::ray_cast::{EdgeKind, RayBuffer, SensorPose, SweepContext};
use super::rotation::RotationPattern;
use super::tracker::TargetSets;

/// Параметры сетки sweep'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepShape {
    /// Центр (градусы относительно взгляда)
    pub center: f32,
    /// Ширина конуса (градусы)
    pub angle: u32,
    /// Секторов на градус
    pub resolution: f32,
    /// Шагов бисекции на край
    pub accuracy: u32,
}

/// Число секторов (дробное, как в сетке: последний сектор может быть неполным)
pub fn sector_count(angle: u32, resolution: f32) -> f32 {
    (angle as f32 * resolution).max(1.0)
}

/// Число базовых лучей до refinement
pub fn base_sample_count(angle: u32, resolution: f32) -> usize {
    sector_count(angle, resolution).floor() as usize + 1
}

/// Полный sweep: очищает buffer, кастует базовые лучи + refinement, сворачивает discoveries
pub fn sweep_cone(buffer: &mut RayBuffer, ctx: &SweepContext<'_>, shape: SweepShape) {
    buffer.clear();

    let sectors = sector_count(shape.angle, shape.resolution);
    let sector_angle = shape.angle as f32 / sectors;
    let first_angle = shape.center - shape.angle as f32 / 2.0;

    let mut previous: Option<usize> = None;

    for step in 0..base_sample_count(shape.angle, shape.resolution) {
        let angle = first_angle + step as f32 * sector_angle;
        let current = buffer.cast(ctx, angle);

        if let Some(previous) = previous {
            generate_subsegments(buffer, ctx, previous, current, shape.accuracy);
        }

        buffer.push_ordered(current);
        buffer.record_edge(ctx, current, EdgeKind::Sector);
        previous = Some(current);
    }

    buffer.reduce_discoveries();
}

/// Idle отклонение: cool-down pattern во время FadeOut, иначе default
pub fn idle_deviation(
    default_rotation: &RotationPattern,
    cool_down_rotation: &RotationPattern,
    mode: SkinMode,
    rotation_paused: bool,
    elapsed: f32,
) -> f32 {
    if rotation_paused {
        return 0.0;
    }

    let pattern = if mode == SkinMode::FadeOut {
        cool_down_rotation
    } else {
        default_rotation
    };

    pattern.evaluate(elapsed)
}

/// Угол (градусы) на ближайшую известную цель в горизонтальной плоскости сенсора
///
/// Цель без позиции (despawn) пропускается — берётся следующая по дистанции.
pub fn target_deviation(
    targets: &TargetSets,
    pose: &SensorPose,
    position_of: impl Fn(Entity) -> Option<Vec3>,
) -> Option<f32> {
    targets.nearest_first().into_iter().find_map(|target| {
        let local = pose.to_local(position_of(target.entity)?);
        Some(local.x.atan2(local.z).to_degrees())
    })
}
