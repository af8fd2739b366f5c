//! Конфигурация сенсора (persisted data, без derived/cached полей)
//!
//! Загрузка: TOML через serde, каждое поле имеет default.
//! Значения вне диапазона не ошибка — clamp в момент присваивания.
//! Неоднозначная таблица прозрачности — ошибка конфигурации (для tooling слоя),
//! но runtime всё равно резолвит её детерминированно (последняя подходящая запись).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::{LAYER_ALL, LAYER_NONE, LAYER_TARGETS};
use crate::sensor::rotation::RotationPattern;

pub const MIN_ANGLE: u32 = 1;
pub const MAX_ANGLE: u32 = 360;

pub const MIN_RESOLUTION: f32 = 0.5;
pub const MAX_RESOLUTION: f32 = 2.0;

pub const MIN_ACCURACY: u32 = 2;
pub const MAX_ACCURACY: u32 = 10;

/// Выше этого уровня качество почти не растёт, а число лучей — растёт
pub const RECOMMENDED_MAX_ACCURACY: u32 = 5;

/// Нижняя граница detection/cool-down времени (скорость blend = reach / time)
pub const MIN_BLEND_TIME: f32 = 0.01;

pub const MAX_TRANSPARENCY: u8 = 100;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Категории, заявленные несколькими записями таблицы прозрачности
    #[error("ambiguous obstacle layers configuration: categories {categories:#b}")]
    AmbiguousLayers { categories: u32 },
}

/// Нефатальные проблемы конфигурации (сенсор работает, но что-то отключено)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Targets layer пустой — detection отключен
    EmptyTargetsLayer,
    /// Таблица прозрачности пустая — препятствия не влияют на конус
    EmptyLayersTable,
    /// Все visibility rules выключены — конус никогда не рендерится
    AllVisibilityRulesOff,
    /// Accuracy выше рекомендуемой
    HighCurveAccuracy(u32),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::EmptyTargetsLayer => {
                write!(f, "targets layer is empty, detection is disabled")
            }
            ConfigWarning::EmptyLayersTable => {
                write!(f, "obstacle layers table is empty, the cone ignores all obstacles")
            }
            ConfigWarning::AllVisibilityRulesOff => {
                write!(f, "all visibility rules are off, the cone is never rendered")
            }
            ConfigWarning::HighCurveAccuracy(accuracy) => write!(
                f,
                "curve accuracy {} is above {}, quality gain is negligible",
                accuracy, RECOMMENDED_MAX_ACCURACY
            ),
        }
    }
}

/// Правила видимости меша конуса
///
/// `None` — convenience: enable(None) выключает все три, disable(None) включает все три.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityRule {
    None,
    AlwaysVisible,
    VisibleIfDetected,
    VisibleDuringCoolDown,
}

/// Прозрачность категорий препятствий
///
/// transparency: 0 = непрозрачно (луч обрывается на препятствии),
/// 100 = полностью прозрачно (длина луча не меняется).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTransparency {
    pub mask: u32,
    pub transparency: u8,
}

impl LayerTransparency {
    pub fn new(mask: u32, transparency: u8) -> Self {
        Self {
            mask,
            transparency: transparency.min(MAX_TRANSPARENCY),
        }
    }
}

/// Таблица прозрачности в порядке сканирования
///
/// Порядок: `LAYER_ALL` (default) первым, затем по возрастанию маски.
/// Побеждает последняя подходящая запись — узкие маски переопределяют default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransparencyTable {
    entries: Vec<LayerTransparency>,
    obstacle_mask: u32,
}

impl TransparencyTable {
    pub fn new(layers: &[LayerTransparency]) -> Self {
        // Поля LayerTransparency публичные — clamp здесь, а не только в конфиге
        let mut entries: Vec<_> = layers
            .iter()
            .map(|entry| LayerTransparency::new(entry.mask, entry.transparency))
            .collect();
        entries.sort_by_key(|entry| scan_key(entry.mask));

        let obstacle_mask = entries.iter().fold(LAYER_NONE, |mask, entry| mask | entry.mask);

        Self {
            entries,
            obstacle_mask,
        }
    }

    /// Объединение всех масок таблицы
    pub fn obstacle_mask(&self) -> u32 {
        self.obstacle_mask
    }

    pub fn entries(&self) -> &[LayerTransparency] {
        &self.entries
    }

    /// Прозрачность для коллайдера с категориями `layers` (None = не препятствие)
    pub fn resolve(&self, layers: u32) -> Option<u8> {
        if self.obstacle_mask & layers == 0 {
            return None;
        }

        let mut transparency = 0;
        for entry in &self.entries {
            if entry.mask & layers != 0 {
                transparency = entry.transparency;
            }
        }

        Some(transparency)
    }
}

/// `LAYER_ALL` сортируется раньше всех (как "everything" = -1 в знаковой маске)
fn scan_key(mask: u32) -> (bool, u32) {
    (mask != LAYER_ALL, mask)
}

/// Полная конфигурация сенсора
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOfViewConfig {
    #[serde(default = "default_view_radius")]
    pub view_radius: f32,
    #[serde(default = "default_view_angle")]
    pub view_angle: u32,
    /// Sectors per degree
    #[serde(default = "default_view_resolution")]
    pub view_resolution: f32,

    #[serde(default = "default_true")]
    pub always_visible: bool,
    #[serde(default)]
    pub visible_if_target_detected: bool,
    #[serde(default)]
    pub visible_during_cool_down: bool,

    /// Паттерн вращения пока цели не обнаружены
    #[serde(default)]
    pub default_rotation: RotationPattern,
    /// Паттерн вращения во время cool-down (цель только что пропала)
    #[serde(default)]
    pub cool_down_rotation: RotationPattern,

    /// Категории, которые сканируются как цели
    #[serde(default = "default_targets_layer")]
    pub targets_layer: u32,

    /// Время заполнения конуса 'active' skin (секунды)
    #[serde(default = "default_detection_time")]
    pub detection_time: f32,
    /// Время возврата конуса к 'passive' skin (секунды)
    #[serde(default = "default_cool_down_time")]
    pub cool_down_time: f32,

    #[serde(default = "default_layers")]
    pub layers: Vec<LayerTransparency>,

    /// Число итераций бинарного поиска на краях препятствий
    #[serde(default = "default_curve_accuracy")]
    pub curve_accuracy: u32,

    #[serde(default = "default_true")]
    pub show_sector_edges: bool,
}

fn default_view_radius() -> f32 { 3.0 }
fn default_view_angle() -> u32 { 45 }
fn default_view_resolution() -> f32 { 0.75 }
fn default_true() -> bool { true }
fn default_targets_layer() -> u32 { LAYER_TARGETS }
fn default_detection_time() -> f32 { 2.0 }
fn default_cool_down_time() -> f32 { 5.0 }
fn default_curve_accuracy() -> u32 { 5 }

/// 'все категории с 0% прозрачности'
fn default_layers() -> Vec<LayerTransparency> {
    vec![LayerTransparency::new(LAYER_ALL, 0)]
}

impl Default for FieldOfViewConfig {
    fn default() -> Self {
        Self {
            view_radius: default_view_radius(),
            view_angle: default_view_angle(),
            view_resolution: default_view_resolution(),
            always_visible: true,
            visible_if_target_detected: false,
            visible_during_cool_down: false,
            default_rotation: RotationPattern::default(),
            cool_down_rotation: RotationPattern::default(),
            targets_layer: default_targets_layer(),
            detection_time: default_detection_time(),
            cool_down_time: default_cool_down_time(),
            layers: default_layers(),
            curve_accuracy: default_curve_accuracy(),
            show_sector_edges: true,
        }
    }
}

pub fn clamp_radius(radius: f32) -> f32 {
    if radius.is_nan() {
        return 0.0;
    }
    radius.max(0.0)
}

pub fn clamp_angle(angle: u32) -> u32 {
    angle.clamp(MIN_ANGLE, MAX_ANGLE)
}

pub fn clamp_resolution(resolution: f32) -> f32 {
    if resolution.is_nan() {
        return MIN_RESOLUTION;
    }
    resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION)
}

pub fn clamp_accuracy(accuracy: u32) -> u32 {
    accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY)
}

pub fn clamp_blend_time(time: f32) -> f32 {
    if time.is_nan() {
        return MIN_BLEND_TIME;
    }
    time.max(MIN_BLEND_TIME)
}

impl FieldOfViewConfig {
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        Ok(config.clamped())
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    /// Приводит все числовые поля к допустимым диапазонам
    pub fn clamped(mut self) -> Self {
        self.view_radius = clamp_radius(self.view_radius);
        self.view_angle = clamp_angle(self.view_angle);
        self.view_resolution = clamp_resolution(self.view_resolution);
        self.curve_accuracy = clamp_accuracy(self.curve_accuracy);
        self.detection_time = clamp_blend_time(self.detection_time);
        self.cool_down_time = clamp_blend_time(self.cool_down_time);
        self.default_rotation = self.default_rotation.normalized();
        self.cool_down_rotation = self.cool_down_rotation.normalized();

        for entry in &mut self.layers {
            entry.transparency = entry.transparency.min(MAX_TRANSPARENCY);
        }

        self
    }

    /// Категории, заявленные более чем одной записью
    ///
    /// `LAYER_ALL` — отдельная псевдо-категория "everything": конфликтует только
    /// с другой записью `LAYER_ALL`, узкие записи её переопределяют.
    pub fn ambiguous_layers(&self) -> u32 {
        let mut claimed = LAYER_NONE;
        let mut ambiguous = LAYER_NONE;
        let mut everything_entries = 0;

        for entry in &self.layers {
            if entry.mask == LAYER_ALL {
                everything_entries += 1;
                continue;
            }

            ambiguous |= claimed & entry.mask;
            claimed |= entry.mask;
        }

        if everything_entries > 1 {
            ambiguous = LAYER_ALL;
        }

        ambiguous
    }

    pub fn validate(&self) -> ConfigResult<Vec<ConfigWarning>> {
        let categories = self.ambiguous_layers();
        if categories != LAYER_NONE {
            return Err(ConfigError::AmbiguousLayers { categories });
        }

        let mut warnings = Vec::new();

        if self.targets_layer == LAYER_NONE {
            warnings.push(ConfigWarning::EmptyTargetsLayer);
        }

        if self.layers.iter().all(|entry| entry.mask == LAYER_NONE) {
            warnings.push(ConfigWarning::EmptyLayersTable);
        }

        if !self.always_visible && !self.visible_if_target_detected && !self.visible_during_cool_down {
            warnings.push(ConfigWarning::AllVisibilityRulesOff);
        }

        if self.curve_accuracy > RECOMMENDED_MAX_ACCURACY {
            warnings.push(ConfigWarning::HighCurveAccuracy(self.curve_accuracy));
        }

        Ok(warnings)
    }

    pub fn transparency_table(&self) -> TransparencyTable {
        TransparencyTable::new(&self.layers)
    }
}
