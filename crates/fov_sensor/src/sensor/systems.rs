//! Systems сенсора (FixedUpdate)
//!
//! `tick_sensor` — весь tick одного сенсора без ECS зависимостей (тестируется напрямую).
//! `advance_field_of_view` — обёртка: собирает world pose/иерархию/позиции целей из World,
//! публикует события и зовёт listeners.

use bevy::prelude::*;

use super::blender::{BlendParameters, BlendTiming};
use super::cone_sampler::{idle_deviation, sweep_cone, target_deviation, SweepShape};
use super::events::{FieldOfViewEvent, TargetListeners};
use super::polygon::ConeMesh;
use super::ray_cast::{RayBuffer, SensorPose, SweepContext};
use super::schedule::SensorTask;
use super::tracker::TargetTransition;
use super::FieldOfView;
use crate::logger;
use crate::scene::{hierarchy_root, world_transform, SceneQuery};

/// Внешние входы одного tick'а
pub struct SensorFrame<'a> {
    /// World pose сенсора (без look-at override)
    pub pose: SensorPose,
    /// Elapsed time (секунды, монотонно)
    pub now: f32,
    pub delta: f32,
    pub scene: &'a dyn SceneQuery,
    pub is_own: &'a dyn Fn(Entity) -> bool,
    /// World позиция цели (None = цели больше нет)
    pub position_of: &'a dyn Fn(Entity) -> Option<Vec3>,
}

/// Один tick сенсора: tasks → sweep → polygon → tracker → blender
///
/// Transitions дописываются в `transitions` в порядке срабатывания.
pub fn tick_sensor(
    fov: &mut FieldOfView,
    rays: &mut RayBuffer,
    mesh: &mut ConeMesh,
    parameters: &mut BlendParameters,
    frame: &SensorFrame<'_>,
    transitions: &mut Vec<TargetTransition>,
) {
    fov.clock = frame.now;
    poll_tasks(fov);

    let pose = effective_pose(fov, frame.pose);

    let center = if fov.targets.is_empty() {
        None
    } else {
        target_deviation(&fov.targets, &pose, frame.position_of)
    }
    .unwrap_or_else(|| {
        idle_deviation(
            &fov.config.default_rotation,
            &fov.config.cool_down_rotation,
            fov.blend.mode(),
            fov.rotation_paused,
            frame.now,
        )
    });

    let ctx = SweepContext {
        pose,
        radius: fov.config.view_radius,
        targets_layer: fov.config.targets_layer,
        transparency: &fov.transparency,
        scene: frame.scene,
        is_own: frame.is_own,
        record_edges: fov.config.show_sector_edges,
    };

    sweep_cone(
        rays,
        &ctx,
        SweepShape {
            center,
            angle: fov.config.view_angle,
            resolution: fov.config.view_resolution,
            accuracy: fov.config.curve_accuracy,
        },
    );

    if fov.is_view_visible() {
        mesh.build(rays, &pose, fov.config.view_radius);
    } else if !mesh.is_empty() {
        mesh.clear();
    }

    fov.targets
        .apply_discoveries(rays.nearest_discoveries(), fov.blend.skin_offset(), transitions);

    // Цели важнее look-at: внимание возвращается к ним
    if !fov.targets.is_empty() {
        fov.cancel_look_at();
    }

    let timing = BlendTiming {
        now: frame.now,
        delta: frame.delta,
        detection_time: fov.config.detection_time,
        cool_down_time: fov.config.cool_down_time,
    };
    fov.blend.update(&fov.targets, rays.max_length(), timing, parameters);
}

fn poll_tasks(fov: &mut FieldOfView) {
    for (token, task) in fov.tasks.take_due(fov.clock) {
        match task {
            SensorTask::ReleaseLookAt => {
                if fov.look_at.is_some_and(|look_at| look_at.release == token) {
                    fov.look_at = None;
                    logger::log(&format!("FieldOfView: look-at released at t={:.2}s", fov.clock));
                }
            }
        }
    }
}

/// Pose с учётом look-at override (yaw к точке, scale сохраняется)
fn effective_pose(fov: &FieldOfView, pose: SensorPose) -> SensorPose {
    let Some(look_at) = fov.look_at else {
        return pose;
    };

    let offset = look_at.point - pose.origin;
    if offset.x.abs() < f32::EPSILON && offset.z.abs() < f32::EPSILON {
        return pose;
    }

    SensorPose {
        rotation: Quat::from_rotation_y(offset.x.atan2(offset.z)),
        ..pose
    }
}

/// System: tick всех сенсоров против адаптера сцены `S`
pub fn advance_field_of_view<S: SceneQuery + Resource>(
    time: Res<Time<Fixed>>,
    scene: Res<S>,
    mut sensors: Query<(
        Entity,
        &mut FieldOfView,
        &mut RayBuffer,
        &mut ConeMesh,
        &mut BlendParameters,
        Option<&mut TargetListeners>,
    )>,
    transforms: Query<&Transform>,
    parents: Query<&ChildOf>,
    mut events: EventWriter<FieldOfViewEvent>,
) {
    let now = time.elapsed_secs();
    let delta = time.delta_secs();
    let mut transitions = Vec::new();

    for (observer, mut fov, mut rays, mut mesh, mut parameters, listeners) in sensors.iter_mut() {
        let Some(world) = world_transform(observer, &transforms, &parents) else {
            continue;
        };

        // Собственное тело: всё, что висит на том же корне иерархии
        let root = hierarchy_root(observer, &parents);
        let is_own = |entity: Entity| hierarchy_root(entity, &parents) == root;
        let position_of =
            |entity: Entity| world_transform(entity, &transforms, &parents).map(|transform| transform.translation);

        let frame = SensorFrame {
            pose: SensorPose::from(&world),
            now,
            delta,
            scene: &*scene,
            is_own: &is_own,
            position_of: &position_of,
        };

        transitions.clear();
        tick_sensor(
            &mut fov,
            &mut rays,
            &mut mesh,
            &mut parameters,
            &frame,
            &mut transitions,
        );

        if transitions.is_empty() {
            continue;
        }

        let fired: Vec<FieldOfViewEvent> = transitions
            .iter()
            .map(|transition| FieldOfViewEvent::from_transition(observer, *transition))
            .collect();

        for event in &fired {
            logger::log_info(&format!("FieldOfView {:?}: {:?}", observer, event));
        }

        if let Some(mut listeners) = listeners {
            for event in &fired {
                listeners.notify(event);
            }
        }

        events.write_batch(fired);
    }
}
