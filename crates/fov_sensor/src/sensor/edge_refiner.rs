//! EdgeRefiner — восстановление силуэтов препятствий между соседними лучами
//!
//! Фиксированная угловая сетка не видит край препятствия внутри сектора.
//! Если у соседних лучей разное число попаданий — бинарным поиском ищем границу.
//!
//! Алгоритм:
//! 1. `accuracy` шагов бисекции: средний луч совпал с A → сдвигаем A-границу, иначе B-границу
//! 2. Рекурсия (explicit work stack) на [A, start_ray] и [end_ray, B], только для найденных сторон
//! 3. Глубина ограничена `MAX_REFINEMENT_DEPTH` → работа O(sectors × accuracy)

use super::ray_cast::{EdgeKind, RayBuffer, SweepContext};

/// Сектор уже меньше — дальше не делим (градусы)
pub const MIN_SUBSEGMENT_ANGLE: f32 = 0.1;

/// Максимальная глубина рекурсии на один базовый сектор
pub const MAX_REFINEMENT_DEPTH: u32 = 4;

/// Результат одного шага уточнения (индексы в `RayBuffer`)
///
/// Сторона отсутствует, если бисекция ни разу не сдвинула соответствующую границу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentEdgeRays {
    /// Ближайший к границе луч с тем же числом попаданий, что у начального
    pub start_ray: Option<usize>,
    /// Ближайший к границе луч с отличающимся числом попаданий
    pub end_ray: Option<usize>,
}

/// Есть ли что уточнять между двумя лучами
pub fn needs_refinement(buffer: &RayBuffer, start: usize, end: usize) -> bool {
    let start_ray = buffer.ray(start);
    let end_ray = buffer.ray(end);

    start_ray.obstacle_hits != end_ray.obstacle_hits
        && (end_ray.angle - start_ray.angle).abs() > MIN_SUBSEGMENT_ANGLE
}

/// `accuracy` шагов бисекции между `start` и `end`
pub fn find_subsegment_edges(
    buffer: &mut RayBuffer,
    ctx: &SweepContext<'_>,
    start: usize,
    end: usize,
    accuracy: u32,
) -> SegmentEdgeRays {
    let start_hits = buffer.ray(start).obstacle_hits;
    let mut start_angle = buffer.ray(start).angle;
    let mut end_angle = buffer.ray(end).angle;

    let mut edges = SegmentEdgeRays::default();

    for _ in 0..accuracy {
        let middle_angle = (start_angle + end_angle) / 2.0;
        let middle = buffer.cast(ctx, middle_angle);

        if buffer.ray(middle).obstacle_hits == start_hits {
            start_angle = middle_angle;
            edges.start_ray = Some(middle);
        } else {
            end_angle = middle_angle;
            edges.end_ray = Some(middle);
        }
    }

    edges
}

/// Уточняет сектор [start, end] и дописывает найденные лучи в последовательность
///
/// Лучи добавляются упорядоченными по углу — вызывающий код кладёт `end` после них.
/// Равное число попаданий у краёв ⇒ ни одного дополнительного луча.
pub fn generate_subsegments(
    buffer: &mut RayBuffer,
    ctx: &SweepContext<'_>,
    start: usize,
    end: usize,
    accuracy: u32,
) {
    buffer.refined.clear();
    buffer.refine_stack.clear();
    buffer.refine_stack.push((start, end, 0));

    while let Some((span_start, span_end, depth)) = buffer.refine_stack.pop() {
        if depth >= MAX_REFINEMENT_DEPTH || !needs_refinement(buffer, span_start, span_end) {
            continue;
        }

        let edges = find_subsegment_edges(buffer, ctx, span_start, span_end, accuracy);

        if let Some(edge) = edges.start_ray {
            buffer.refined.push(edge);
            buffer.record_edge(ctx, edge, EdgeKind::SubsegmentStart);
            buffer.refine_stack.push((span_start, edge, depth + 1));
        }

        if let Some(edge) = edges.end_ray {
            buffer.refined.push(edge);
            buffer.record_edge(ctx, edge, EdgeKind::SubsegmentEnd);
            buffer.refine_stack.push((edge, span_end, depth + 1));
        }
    }

    let mut refined = std::mem::take(&mut buffer.refined);
    refined.sort_by(|&a, &b| buffer.ray(a).angle.total_cmp(&buffer.ray(b).angle));

    for &index in &refined {
        buffer.push_ordered(index);
    }

    // Возвращаем scratch обратно (capacity сохраняется)
    refined.clear();
    buffer.refined = refined;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{PrimitiveScene, SceneCollider, LAYER_OBSTACLES};
    use crate::sensor::test_support::{sweep_context, CountingScene};
    use bevy::prelude::*;

    /// Стена, закрывающая правую половину обзора (x > 0) на дистанции 2
    fn half_wall_scene() -> PrimitiveScene {
        let mut scene = PrimitiveScene::default();
        scene.insert(
            Entity::from_raw(10),
            &Transform::from_xyz(2.5, 0.0, 2.0),
            &SceneCollider::rect(Vec2::new(2.5, 0.1), LAYER_OBSTACLES),
        );
        scene
    }

    #[test]
    fn test_equal_hit_counts_cast_nothing() {
        let scene = CountingScene::new(PrimitiveScene::default());
        let table = crate::config::FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 3.0);

        let mut buffer = RayBuffer::default();
        let a = buffer.cast(&ctx, -20.0);
        let b = buffer.cast(&ctx, 20.0);
        let casts_before = scene.casts();

        generate_subsegments(&mut buffer, &ctx, a, b, 5);

        assert_eq!(scene.casts(), casts_before);
        assert_eq!(buffer.ordered_len(), 0);
    }

    #[test]
    fn test_bisection_converges_on_wall_edge() {
        let scene = CountingScene::new(half_wall_scene());
        let table = crate::config::FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 5.0);

        let mut buffer = RayBuffer::default();
        let a = buffer.cast(&ctx, -20.0);
        let b = buffer.cast(&ctx, 20.0);
        assert_eq!(buffer.ray(a).obstacle_hits, 0);
        assert_eq!(buffer.ray(b).obstacle_hits, 1);

        let edges = find_subsegment_edges(&mut buffer, &ctx, a, b, 6);
        let start = buffer.ray(edges.start_ray.unwrap());
        let end = buffer.ray(edges.end_ray.unwrap());

        // Край стены — угол 0° (луч ровно по краю уже попадает), бракет 40° / 2^6
        assert!(start.angle < 0.0 && end.angle >= 0.0);
        assert!(end.angle - start.angle <= 40.0 / 64.0 + 1e-4);
        assert_eq!(start.obstacle_hits, 0);
        assert_eq!(end.obstacle_hits, 1);
    }

    #[test]
    fn test_single_edge_costs_exactly_accuracy_casts() {
        let scene = CountingScene::new(half_wall_scene());
        let table = crate::config::FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 5.0);

        let mut buffer = RayBuffer::default();
        let a = buffer.cast(&ctx, -20.0);
        let b = buffer.cast(&ctx, 20.0);
        let casts_before = scene.casts();

        generate_subsegments(&mut buffer, &ctx, a, b, 4);

        // Обе подсекции [A, start] и [end, B] однородны — рекурсия ничего не кастует
        assert_eq!(scene.casts() - casts_before, 4);
        assert_eq!(buffer.ordered_len(), 2);
    }

    #[test]
    fn test_refined_rays_are_ordered_by_angle() {
        // Две стены: разное число попаданий на трёх участках → рекурсия
        let mut inner = half_wall_scene();
        inner.insert(
            Entity::from_raw(11),
            &Transform::from_xyz(4.0, 0.0, 3.0),
            &SceneCollider::rect(Vec2::new(2.0, 0.1), LAYER_OBSTACLES),
        );
        let scene = CountingScene::new(inner);
        let table = crate::config::TransparencyTable::new(&[crate::config::LayerTransparency::new(
            LAYER_OBSTACLES,
            100,
        )]);
        let ctx = sweep_context(&scene, &table, 8.0);

        let mut buffer = RayBuffer::default();
        let a = buffer.cast(&ctx, -10.0);
        let b = buffer.cast(&ctx, 45.0);
        let accuracy = 5;
        let casts_before = scene.casts();

        generate_subsegments(&mut buffer, &ctx, a, b, accuracy);

        let angles: Vec<f32> = buffer.ordered().map(|ray| ray.angle).collect();
        assert!(!angles.is_empty());
        assert!(angles.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(angles.iter().all(|&angle| angle > -10.0 && angle < 45.0));

        // Жёсткая граница работы: не больше 2^depth отрезков по accuracy лучей
        let max_casts = ((1usize << MAX_REFINEMENT_DEPTH) - 1) * accuracy as usize;
        assert!(scene.casts() - casts_before <= max_casts);
    }

    #[test]
    fn test_tiny_sector_is_not_refined() {
        let scene = CountingScene::new(half_wall_scene());
        let table = crate::config::FieldOfViewConfig::default().transparency_table();
        let ctx = sweep_context(&scene, &table, 5.0);

        let mut buffer = RayBuffer::default();
        let a = buffer.cast(&ctx, -0.04);
        let b = buffer.cast(&ctx, 0.04);

        assert!(!needs_refinement(&buffer, a, b));
    }
}
