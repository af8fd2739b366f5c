//! VisualBlender — skin offset (граница active/passive частей конуса) и skin mode
//!
//! Обновляется после TargetTracker. Reach = максимальная длина луча в этом tick.
//! - detected не пуст → offset = reach, Active
//! - оба набора пусты, offset ≈ 0 → offset = 0, Passive
//! - оба набора пусты, offset > 0 → offset -= Δt × reach / cool_down_time, FadeOut
//! - spotted не пуст → offset += Δt × reach / detection_time, FadeIn
//!
//! Offset всегда в [0, reach]. Смена mode снапшотит `BlendParameters` для материала;
//! повторный запрос того же mode ничего не меняет.

use bevy::prelude::*;

use super::tracker::TargetSets;

/// Offset меньше — считаем нулём
pub const SKIN_OFFSET_EPSILON: f32 = 1e-5;

/// Skin mode (имена keyword'ов совпадают с шейдером)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum SkinMode {
    /// Целей нет, конус полностью 'passive'
    #[default]
    Passive,
    /// Есть detected цель, конус полностью 'active'
    Active,
    /// Есть spotted цель, граница растёт к reach
    FadeIn,
    /// Цели пропали, граница отступает к 0
    FadeOut,
}

impl SkinMode {
    pub const ALL: [SkinMode; 4] = [SkinMode::Passive, SkinMode::Active, SkinMode::FadeIn, SkinMode::FadeOut];

    /// Shader keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            SkinMode::Passive => "PASSIVE_MODE",
            SkinMode::Active => "ACTIVE_MODE",
            SkinMode::FadeIn => "FADE_IN_MODE",
            SkinMode::FadeOut => "FADE_OUT_MODE",
        }
    }
}

/// Параметры для материала конуса (снапшот на момент смены mode)
///
/// Шейдер сам продолжает анимацию: `offset(t) = skin_offset ± speed × (t - mode_started_at)`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect)]
#[reflect(Component)]
pub struct BlendParameters {
    pub mode: SkinMode,
    /// Elapsed time момента смены mode (секунды)
    pub mode_started_at: f32,
    /// Скорость роста (единиц/сек)
    pub fade_in_speed: f32,
    /// Скорость отступления (единиц/сек)
    pub fade_out_speed: f32,
    pub skin_offset: f32,
}

/// Время для одного шага blender'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendTiming {
    pub now: f32,
    pub delta: f32,
    pub detection_time: f32,
    pub cool_down_time: f32,
}

/// Живое состояние blender'а (принадлежит сенсору)
#[derive(Debug, Clone, Default)]
pub struct SkinBlend {
    /// None до первого tick
    mode: Option<SkinMode>,
    skin_offset: f32,
}

impl SkinBlend {
    pub fn mode(&self) -> SkinMode {
        self.mode.unwrap_or_default()
    }

    pub fn skin_offset(&self) -> f32 {
        self.skin_offset
    }

    /// Шаг blender'а. true если mode сменился (параметры перезаписаны).
    pub fn update(
        &mut self,
        targets: &TargetSets,
        reach: f32,
        timing: BlendTiming,
        parameters: &mut BlendParameters,
    ) -> bool {
        let reach = reach.max(0.0);

        let mode = if !targets.detected().is_empty() {
            self.skin_offset = reach;
            SkinMode::Active
        } else if targets.spotted().is_empty() && self.skin_offset.abs() < SKIN_OFFSET_EPSILON {
            self.skin_offset = 0.0;
            SkinMode::Passive
        } else if targets.spotted().is_empty() {
            let fade_out_speed = reach / timing.cool_down_time;
            self.skin_offset = (self.skin_offset - timing.delta * fade_out_speed).max(0.0);
            SkinMode::FadeOut
        } else {
            let fade_in_speed = reach / timing.detection_time;
            self.skin_offset += timing.delta * fade_in_speed;
            SkinMode::FadeIn
        };

        // Reach мог сжаться (препятствие) — держим offset внутри конуса
        self.skin_offset = self.skin_offset.clamp(0.0, reach);

        self.set_mode(mode, reach, timing, parameters)
    }

    fn set_mode(&mut self, mode: SkinMode, reach: f32, timing: BlendTiming, parameters: &mut BlendParameters) -> bool {
        if self.mode == Some(mode) {
            return false;
        }

        self.mode = Some(mode);
        *parameters = BlendParameters {
            mode,
            mode_started_at: timing.now,
            fade_in_speed: reach / timing.detection_time,
            fade_out_speed: reach / timing.cool_down_time,
            skin_offset: self.skin_offset,
        };

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::tracker::TargetTransition;

    fn timing(now: f32) -> BlendTiming {
        BlendTiming {
            now,
            delta: 0.1,
            detection_time: 2.0,
            cool_down_time: 5.0,
        }
    }

    fn sets_with(spotted: &[(u32, f32)], detected: &[(u32, f32)]) -> TargetSets {
        let mut sets = TargetSets::default();
        let mut transitions: Vec<TargetTransition> = Vec::new();

        let all: Vec<(Entity, f32)> = spotted
            .iter()
            .chain(detected.iter())
            .map(|&(id, distance)| (Entity::from_raw(id), distance))
            .collect();
        sets.apply_discoveries(&all, 0.0, &mut transitions);

        let detected_only: Vec<(Entity, f32)> = all
            .iter()
            .map(|&(entity, distance)| {
                let promote = detected.iter().any(|&(id, _)| Entity::from_raw(id) == entity);
                (entity, if promote { 0.0 } else { distance })
            })
            .collect();
        // offset 0 >= distance 0 → promotion только для detected
        sets.apply_discoveries(&detected_only, 0.0, &mut transitions);
        sets
    }

    #[test]
    fn test_first_update_enters_passive() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();

        let changed = blend.update(&TargetSets::default(), 3.0, timing(0.5), &mut parameters);

        assert!(changed);
        assert_eq!(parameters.mode, SkinMode::Passive);
        assert_eq!(parameters.mode_started_at, 0.5);
        assert_eq!(blend.skin_offset(), 0.0);
    }

    #[test]
    fn test_fade_in_grows_with_reach_over_detection_time() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();
        let sets = sets_with(&[(1, 2.0)], &[]);

        blend.update(&sets, 3.0, timing(0.0), &mut parameters);
        assert_eq!(blend.mode(), SkinMode::FadeIn);
        assert!((blend.skin_offset() - 0.15).abs() < 1e-5);
        assert!((parameters.fade_in_speed - 1.5).abs() < 1e-5);
        assert!((parameters.fade_out_speed - 0.6).abs() < 1e-5);

        let mut previous = blend.skin_offset();
        for step in 1..40 {
            blend.update(&sets, 3.0, timing(step as f32 * 0.1), &mut parameters);
            assert!(blend.skin_offset() > previous || blend.skin_offset() == 3.0);
            assert!(blend.skin_offset() <= 3.0);
            previous = blend.skin_offset();
        }
        assert_eq!(blend.skin_offset(), 3.0);
    }

    #[test]
    fn test_detected_sets_offset_to_reach() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();
        let sets = sets_with(&[], &[(1, 1.0)]);

        blend.update(&sets, 2.5, timing(1.0), &mut parameters);
        assert_eq!(blend.mode(), SkinMode::Active);
        assert_eq!(blend.skin_offset(), 2.5);
        assert_eq!(parameters.skin_offset, 2.5);
    }

    #[test]
    fn test_fade_out_decays_to_passive() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();
        blend.update(&sets_with(&[], &[(1, 1.0)]), 3.0, timing(0.0), &mut parameters);

        let empty = TargetSets::default();
        let mut previous = blend.skin_offset();
        let mut now = 0.0;

        while blend.mode() != SkinMode::Passive {
            now += 0.1;
            blend.update(&empty, 3.0, timing(now), &mut parameters);
            if blend.mode() == SkinMode::FadeOut && previous > 0.0 {
                assert!(blend.skin_offset() < previous);
            }
            assert!(blend.skin_offset() >= 0.0);
            previous = blend.skin_offset();
            assert!(now < 10.0, "cool-down never finished");
        }

        // reach 3 / cool-down 5 = 0.6/s → ~5 s
        assert!(now > 4.5);
        assert_eq!(parameters.mode, SkinMode::Passive);
        assert_eq!(blend.skin_offset(), 0.0);
    }

    #[test]
    fn test_same_mode_is_noop_on_parameters() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();
        let sets = sets_with(&[(1, 2.0)], &[]);

        assert!(blend.update(&sets, 3.0, timing(0.0), &mut parameters));
        let snapshot = parameters;

        assert!(!blend.update(&sets, 3.0, timing(0.1), &mut parameters));
        assert_eq!(parameters, snapshot);
    }

    #[test]
    fn test_offset_clamped_when_reach_shrinks() {
        let mut blend = SkinBlend::default();
        let mut parameters = BlendParameters::default();
        blend.update(&sets_with(&[], &[(1, 1.0)]), 3.0, timing(0.0), &mut parameters);

        // Цель пропала, а конус упёрся в стену на 1.0
        blend.update(&TargetSets::default(), 1.0, timing(0.1), &mut parameters);
        assert!(blend.skin_offset() <= 1.0);
    }

    #[test]
    fn test_keywords() {
        let keywords: Vec<&str> = SkinMode::ALL.iter().map(SkinMode::keyword).collect();
        assert_eq!(keywords, vec!["PASSIVE_MODE", "ACTIVE_MODE", "FADE_IN_MODE", "FADE_OUT_MODE"]);
    }
}
