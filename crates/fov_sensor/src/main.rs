//! Headless demo сенсора
//!
//! Охранник с сенсором на дочерней entity, стены, стеклянная перегородка (50%)
//! и несколько целей, бродящих по seeded waypoints. Lifecycle события — в лог.

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::Rng;

use fov_sensor::{
    create_headless_app, log_info, log_warning, DeterministicRng, FieldOfView, FieldOfViewConfig, FieldOfViewEvent,
    SceneCollider, SensorPlugin, SensorSet, TargetListeners, LAYER_DEFAULT, LAYER_GLASS, LAYER_OBSTACLES,
    LAYER_TARGETS,
};

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/field_of_view.toml");

/// Половина стороны арены
const ARENA_HALF_SIZE: f32 = 6.0;

/// Цель, которая ходит между случайными точками арены
#[derive(Component, Debug)]
struct Wanderer {
    speed: f32,
    waypoint: Vec3,
}

/// Счётчики событий (через Bevy EventReader)
#[derive(Resource, Debug, Default)]
struct DemoStats {
    spotted: usize,
    detected: usize,
    lost: usize,
}

fn random_waypoint(rng: &mut DeterministicRng) -> Vec3 {
    Vec3::new(
        rng.rng.gen_range(-ARENA_HALF_SIZE..ARENA_HALF_SIZE),
        0.0,
        rng.rng.gen_range(-ARENA_HALF_SIZE..ARENA_HALF_SIZE),
    )
}

fn wander(
    time: Res<Time<Fixed>>,
    mut rng: ResMut<DeterministicRng>,
    mut wanderers: Query<(&mut Transform, &mut Wanderer)>,
) {
    let delta = time.delta_secs();

    for (mut transform, mut wanderer) in wanderers.iter_mut() {
        let offset = wanderer.waypoint - transform.translation;
        let step = wanderer.speed * delta;

        if offset.length() <= step {
            transform.translation = wanderer.waypoint;
            wanderer.waypoint = random_waypoint(&mut rng);
        } else {
            transform.translation += offset.normalize() * step;
        }
    }
}

fn count_events(mut events: EventReader<FieldOfViewEvent>, mut stats: ResMut<DemoStats>) {
    for event in events.read() {
        match event {
            FieldOfViewEvent::TargetSpotted { .. } => stats.spotted += 1,
            FieldOfViewEvent::TargetDetected { .. } => stats.detected += 1,
            FieldOfViewEvent::TargetLost { .. } => stats.lost += 1,
        }
    }
}

fn load_config() -> FieldOfViewConfig {
    match FieldOfViewConfig::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(error) => {
            log_warning(&format!("Demo: {}, using defaults", error));
            FieldOfViewConfig::default()
        }
    }
}

fn spawn_arena(world: &mut World, config: FieldOfViewConfig) {
    // Охранник: тело + сенсор чуть впереди (тело не должно закрывать обзор)
    let guard = world
        .spawn((Transform::from_xyz(0.0, 0.0, -4.0), SceneCollider::circle(0.4, LAYER_DEFAULT)))
        .id();

    world.spawn((
        FieldOfView::new(config),
        Transform::from_xyz(0.0, 0.0, 0.2),
        ChildOf(guard),
        TargetListeners::default().with(|event: &FieldOfViewEvent| {
            if let FieldOfViewEvent::TargetDetected { target, .. } = event {
                log_info(&format!("Demo: guard raises the alarm, {:?} detected", target));
            }
        }),
    ));

    // Стены по периметру
    for (x, z, half_extents) in [
        (0.0, ARENA_HALF_SIZE, Vec2::new(ARENA_HALF_SIZE, 0.2)),
        (0.0, -ARENA_HALF_SIZE, Vec2::new(ARENA_HALF_SIZE, 0.2)),
        (ARENA_HALF_SIZE, 0.0, Vec2::new(0.2, ARENA_HALF_SIZE)),
        (-ARENA_HALF_SIZE, 0.0, Vec2::new(0.2, ARENA_HALF_SIZE)),
    ] {
        world.spawn((Transform::from_xyz(x, 0.0, z), SceneCollider::rect(half_extents, LAYER_OBSTACLES)));
    }

    // Колонна и стеклянная перегородка перед охранником
    world.spawn((Transform::from_xyz(-1.5, 0.0, -1.0), SceneCollider::circle(0.5, LAYER_OBSTACLES)));
    world.spawn((
        Transform::from_xyz(1.5, 0.0, -1.5).with_rotation(Quat::from_rotation_y(0.4)),
        SceneCollider::rect(Vec2::new(1.2, 0.05), LAYER_GLASS),
    ));

    // Цели
    for speed in [1.2, 0.8, 1.6] {
        let waypoint = random_waypoint(&mut world.resource_mut::<DeterministicRng>());
        let start = random_waypoint(&mut world.resource_mut::<DeterministicRng>());

        world.spawn((
            Transform::from_translation(start),
            SceneCollider::circle(0.3, LAYER_TARGETS),
            Wanderer { speed, waypoint },
        ));
    }
}

fn main() {
    let seed = 42;
    println!("Starting field of view headless demo (seed: {})", seed);

    let mut app = create_headless_app(seed);
    let config = load_config();

    app.add_plugins(SensorPlugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(1.0 / 60.0)))
        .init_resource::<DemoStats>()
        .add_systems(
            FixedUpdate,
            (
                wander.before(SensorSet::SyncScene),
                count_events.after(SensorSet::Sense),
            ),
        );

    spawn_arena(app.world_mut(), config);

    // Запускаем 1000 тиков симуляции
    for tick in 0..1000 {
        app.update();

        if tick % 100 == 0 {
            let mut sensors = app.world_mut().query::<&FieldOfView>();
            for fov in sensors.iter(app.world()) {
                println!(
                    "Tick {}: {:?} skin {:.2}, {} visible target(s)",
                    tick,
                    fov.skin_mode(),
                    fov.skin_offset(),
                    fov.visible_targets().len()
                );
            }
        }
    }

    let stats = app.world().resource::<DemoStats>();
    println!(
        "Demo complete: {} spotted, {} detected, {} lost",
        stats.spotted, stats.detected, stats.lost
    );
}
