//! Field of view sensor — конус видимости + detection lifecycle
//!
//! Один tick (FixedUpdate, строго по порядку):
//! 1. ScheduledTasks (снятие look-at override)
//! 2. ConeSampler → RayCaster/EdgeRefiner → `RayBuffer`
//! 3. PolygonBuilder → `ConeMesh` (или clear, если конус не должен рендериться)
//! 4. TargetTracker → `FieldOfViewEvent` + `TargetListeners`
//! 5. VisualBlender → `BlendParameters`
//!
//! Всё изменяемое состояние (наборы целей, skin, пауза, override) принадлежит
//! компоненту `FieldOfView` и меняется только через его методы.

use std::marker::PhantomData;

use bevy::prelude::*;

use crate::config::{
    clamp_accuracy, clamp_angle, clamp_blend_time, clamp_radius, clamp_resolution, ConfigResult, ConfigWarning,
    FieldOfViewConfig, LayerTransparency, TransparencyTable, VisibilityRule,
};
use crate::logger;
use crate::scene::{rebuild_primitive_scene, PrimitiveScene, SceneQuery};

pub mod blender;
pub mod cone_sampler;
pub mod edge_refiner;
pub mod events;
pub mod polygon;
pub mod ray_cast;
pub mod rotation;
pub mod schedule;
pub mod systems;
pub mod tracker;

#[cfg(test)]
mod test_support;


pub use blender::{BlendParameters, SkinMode};
pub use events::{FieldOfViewEvent, TargetListeners};
pub use polygon::ConeMesh;
pub use ray_cast::{DebugEdge, EdgeKind, RayBuffer, RayCastResult};
pub use rotation::{Interpolation, Keyframe, RotationPattern, WrapMode};
pub use systems::advance_field_of_view;
pub use tracker::{TargetSets, TrackedTarget};

use blender::SkinBlend;
use schedule::{ScheduledTasks, SensorTask, TaskToken};

/// Порядок систем сенсора внутри FixedUpdate
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorSet {
    /// Снимок геометрии для ray-запросов
    SyncScene,
    /// Sweep + detection + blend
    Sense,
}

/// Временный поворот сенсора к точке
#[derive(Debug, Clone, Copy, PartialEq)]
struct LookAtOverride {
    point: Vec3,
    release: TaskToken,
}

/// Сенсор поля зрения (на entity наблюдателя или его ребёнке)
///
/// Вся иерархия наблюдателя (общий корень `ChildOf`) — собственное тело, лучи её не видят.
#[derive(Component, Debug)]
#[require(Transform, RayBuffer, ConeMesh, BlendParameters)]
pub struct FieldOfView {
    config: FieldOfViewConfig,
    transparency: TransparencyTable,
    targets: TargetSets,
    blend: SkinBlend,
    rotation_paused: bool,
    look_at: Option<LookAtOverride>,
    tasks: ScheduledTasks,
    /// Elapsed time последнего tick'а (секунды)
    clock: f32,
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self::new(FieldOfViewConfig::default())
    }
}

impl FieldOfView {
    /// Создаёт сенсор: значения clamp'ятся, проблемы конфигурации логируются
    pub fn new(config: FieldOfViewConfig) -> Self {
        let config = config.clamped();
        report_validation(&config.validate());

        Self {
            transparency: config.transparency_table(),
            config,
            targets: TargetSets::default(),
            blend: SkinBlend::default(),
            rotation_paused: false,
            look_at: None,
            tasks: ScheduledTasks::default(),
            clock: 0.0,
        }
    }

    pub fn config(&self) -> &FieldOfViewConfig {
        &self.config
    }

    // === Геометрия конуса ===

    pub fn view_radius(&self) -> f32 {
        self.config.view_radius
    }

    pub fn set_view_radius(&mut self, radius: f32) {
        self.config.view_radius = clamp_radius(radius);
    }

    pub fn view_angle(&self) -> u32 {
        self.config.view_angle
    }

    pub fn set_view_angle(&mut self, angle: u32) {
        self.config.view_angle = clamp_angle(angle);
    }

    pub fn view_resolution(&self) -> f32 {
        self.config.view_resolution
    }

    pub fn set_view_resolution(&mut self, resolution: f32) {
        self.config.view_resolution = clamp_resolution(resolution);
    }

    pub fn curve_accuracy(&self) -> u32 {
        self.config.curve_accuracy
    }

    pub fn set_curve_accuracy(&mut self, accuracy: u32) {
        self.config.curve_accuracy = clamp_accuracy(accuracy);
    }

    // === Detection ===

    pub fn targets_layer(&self) -> u32 {
        self.config.targets_layer
    }

    pub fn set_targets_layer(&mut self, layers: u32) {
        self.config.targets_layer = layers;
    }

    pub fn detection_time(&self) -> f32 {
        self.config.detection_time
    }

    pub fn set_detection_time(&mut self, time: f32) {
        self.config.detection_time = clamp_blend_time(time);
    }

    pub fn cool_down_time(&self) -> f32 {
        self.config.cool_down_time
    }

    pub fn set_cool_down_time(&mut self, time: f32) {
        self.config.cool_down_time = clamp_blend_time(time);
    }

    pub fn layers(&self) -> &[LayerTransparency] {
        &self.config.layers
    }

    /// Новая таблица прозрачности применяется всегда; результат валидации — для tooling слоя
    pub fn set_layers(&mut self, layers: Vec<LayerTransparency>) -> ConfigResult<Vec<ConfigWarning>> {
        self.config.layers = layers;
        self.config = std::mem::take(&mut self.config).clamped();
        self.transparency = self.config.transparency_table();

        let validation = self.config.validate();
        report_validation(&validation);
        validation
    }

    pub fn set_default_rotation(&mut self, pattern: RotationPattern) {
        self.config.default_rotation = pattern.normalized();
    }

    pub fn set_cool_down_rotation(&mut self, pattern: RotationPattern) {
        self.config.cool_down_rotation = pattern.normalized();
    }

    pub fn show_sector_edges(&self) -> bool {
        self.config.show_sector_edges
    }

    pub fn set_show_sector_edges(&mut self, show: bool) {
        self.config.show_sector_edges = show;
    }

    // === Visibility rules ===

    /// `None`: включить "ничего" = выключить все три правила
    pub fn enable_visibility_rule(&mut self, rule: VisibilityRule) {
        self.set_visibility_rule(rule, true);
    }

    /// `None`: выключить "ничего" = включить все три правила
    pub fn disable_visibility_rule(&mut self, rule: VisibilityRule) {
        self.set_visibility_rule(rule, false);
    }

    pub fn is_visibility_rule_enabled(&self, rule: VisibilityRule) -> bool {
        match rule {
            VisibilityRule::None => {
                !self.config.always_visible
                    && !self.config.visible_if_target_detected
                    && !self.config.visible_during_cool_down
            }
            VisibilityRule::AlwaysVisible => self.config.always_visible,
            VisibilityRule::VisibleIfDetected => self.config.visible_if_target_detected,
            VisibilityRule::VisibleDuringCoolDown => self.config.visible_during_cool_down,
        }
    }

    fn set_visibility_rule(&mut self, rule: VisibilityRule, enabled: bool) {
        match rule {
            VisibilityRule::None => {
                self.config.always_visible = !enabled;
                self.config.visible_if_target_detected = !enabled;
                self.config.visible_during_cool_down = !enabled;
            }
            VisibilityRule::AlwaysVisible => self.config.always_visible = enabled,
            VisibilityRule::VisibleIfDetected => self.config.visible_if_target_detected = enabled,
            VisibilityRule::VisibleDuringCoolDown => self.config.visible_during_cool_down = enabled,
        }
    }

    /// Должен ли конус рендериться в этом tick'е
    pub fn is_view_visible(&self) -> bool {
        let targets_visible = !self.targets.is_empty() && self.config.visible_if_target_detected;
        let cooling_down = self.blend.mode() == SkinMode::FadeOut && self.config.visible_during_cool_down;

        self.config.always_visible || targets_visible || cooling_down
    }

    // === Rotation ===

    /// Повернуть центр конуса к точке на `duration` секунд
    ///
    /// Предыдущий look-at (и его отложенное снятие) отменяется.
    /// Поворот только по yaw — сэмплинг планарный.
    pub fn look_at(&mut self, point: Vec3, duration: f32) {
        self.cancel_look_at();

        let release_at = self.clock + duration.max(0.0);
        let release = self.tasks.schedule(release_at, SensorTask::ReleaseLookAt);
        self.look_at = Some(LookAtOverride { point, release });

        logger::log(&format!(
            "FieldOfView: look at {:?} until t={:.2}s",
            point, release_at
        ));
    }

    /// Точка активного look-at override
    pub fn look_at_point(&self) -> Option<Vec3> {
        self.look_at.map(|look_at| look_at.point)
    }

    /// Снять override немедленно (вместе с отложенной задачей)
    pub fn cancel_look_at(&mut self) {
        if let Some(previous) = self.look_at.take() {
            self.tasks.cancel(previous.release);
        }
    }

    pub fn pause_rotation(&mut self) {
        self.rotation_paused = true;
    }

    pub fn resume_rotation(&mut self) {
        self.rotation_paused = false;
    }

    pub fn is_rotation_paused(&self) -> bool {
        self.rotation_paused
    }

    // === Состояние ===

    /// Spotted, затем detected
    pub fn visible_targets(&self) -> Vec<Entity> {
        self.targets.iter().map(|target| target.entity).collect()
    }

    pub fn targets(&self) -> &TargetSets {
        &self.targets
    }

    pub fn skin_mode(&self) -> SkinMode {
        self.blend.mode()
    }

    pub fn skin_offset(&self) -> f32 {
        self.blend.skin_offset()
    }

    /// Elapsed time последнего tick'а
    pub fn elapsed(&self) -> f32 {
        self.clock
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }
}

fn report_validation(validation: &ConfigResult<Vec<ConfigWarning>>) {
    match validation {
        Ok(warnings) => {
            for warning in warnings {
                logger::log_warning(&format!("FieldOfView config: {}", warning));
            }
        }
        Err(error) => logger::log_error(&format!("FieldOfView config: {}", error)),
    }
}

/// Регистрирует сенсор поверх адаптера сцены `S`
///
/// Адаптер — Resource, заполняется системами хоста в `SensorSet::SyncScene`.
pub struct FieldOfViewPlugin<S> {
    _scene: PhantomData<fn() -> S>,
}

impl<S> Default for FieldOfViewPlugin<S> {
    fn default() -> Self {
        Self { _scene: PhantomData }
    }
}

impl<S: SceneQuery + Resource> Plugin for FieldOfViewPlugin<S> {
    fn build(&self, app: &mut App) {
        app.add_event::<FieldOfViewEvent>()
            .register_type::<BlendParameters>()
            .configure_sets(FixedUpdate, (SensorSet::SyncScene, SensorSet::Sense).chain())
            .add_systems(FixedUpdate, advance_field_of_view::<S>.in_set(SensorSet::Sense));
    }
}

/// Reference адаптер: `PrimitiveScene` пересобирается из `SceneCollider` каждый tick
pub struct PrimitiveScenePlugin;

impl Plugin for PrimitiveScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PrimitiveScene>()
            .register_type::<crate::scene::SceneCollider>()
            .add_systems(FixedUpdate, rebuild_primitive_scene.in_set(SensorSet::SyncScene));
    }
}
