//! Field of view sensor
//!
//! Конус видимости с учётом прозрачности препятствий + detection lifecycle
//! (spotted → detected → lost) на Bevy 0.16 ECS.
//!
//! Архитектура:
//! - `scene` — контракт ray-запросов (`SceneQuery`) + reference адаптер на 2D примитивах
//! - `sensor` — sweep, edge refinement, polygon, tracker, blender (FixedUpdate)
//! - `config` — serde/TOML конфигурация с clamp'ами и валидацией таблицы прозрачности
//! - `logger` — pluggable logger (хост подставляет свой printer)

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod config;
pub mod logger;
pub mod scene;
pub mod sensor;

// Re-export основных типов
pub use config::{
    ConfigError, ConfigResult, ConfigWarning, FieldOfViewConfig, LayerTransparency, TransparencyTable, VisibilityRule,
};
pub use logger::{init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel, LogPrinter};
pub use scene::{
    ColliderShape, PrimitiveScene, RayHit, SceneCollider, SceneQuery, SceneQueryError, LAYER_ALL, LAYER_DEFAULT,
    LAYER_GLASS, LAYER_NONE, LAYER_OBSTACLES, LAYER_TARGETS,
};
pub use sensor::{
    BlendParameters, ConeMesh, DebugEdge, EdgeKind, FieldOfView, FieldOfViewEvent, FieldOfViewPlugin, Interpolation,
    Keyframe, PrimitiveScenePlugin, RayBuffer, RotationPattern, SensorSet, SkinMode, TargetListeners, TargetSets,
    WrapMode,
};

/// Главный plugin: сенсоры поверх `PrimitiveScene` на fixed 60Hz clock
pub struct SensorPlugin;

impl Plugin for SensorPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для sensor tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .add_plugins((FieldOfViewPlugin::<PrimitiveScene>::default(), PrimitiveScenePlugin));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Snapshot всех сенсоров для сравнения детерминизма
///
/// Цели, skin и polygon — в байтах (f32 через to_bits, без потерь форматирования).
pub fn sensor_snapshot(world: &mut World) -> Vec<u8> {
    let mut query = world.query::<(Entity, &FieldOfView, &BlendParameters, &ConeMesh)>();
    let mut sensors: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    sensors.sort_by_key(|(entity, ..)| entity.index());

    let mut snapshot = Vec::new();

    for (entity, fov, parameters, mesh) in sensors {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());

        for target in fov.visible_targets() {
            snapshot.extend_from_slice(&target.index().to_le_bytes());
        }

        snapshot.extend_from_slice(fov.skin_mode().keyword().as_bytes());
        snapshot.extend_from_slice(&fov.skin_offset().to_bits().to_le_bytes());
        snapshot.extend_from_slice(&parameters.mode_started_at.to_bits().to_le_bytes());

        for vertex in mesh.vertices() {
            for component in vertex.to_array() {
                snapshot.extend_from_slice(&component.to_bits().to_le_bytes());
            }
        }
    }

    snapshot
}
