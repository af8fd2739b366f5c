//! Rotation patterns — keyframe-функция времени → отклонение центра конуса (градусы)
//!
//! Используются только пока нет spotted/detected целей.
//! Evaluate — чистая функция времени, без внутреннего состояния.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Время (секунды)
    pub time: f32,
    /// Отклонение (градусы)
    pub value: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Smoothstep между соседними ключами (нулевая скорость в ключах)
    Smooth,
    /// Значение левого ключа до следующего
    Step,
}

/// Поведение вне диапазона [first.time, last.time]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapMode {
    /// Держим крайние значения
    Clamp,
    #[default]
    Loop,
    PingPong,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RotationPattern {
    /// Отсортированы по времени (инвариант поддерживается конструкторами)
    #[serde(default)]
    keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub wrap: WrapMode,
}

impl RotationPattern {
    pub fn new(mut keyframes: Vec<Keyframe>, interpolation: Interpolation, wrap: WrapMode) -> Self {
        keyframes.retain(|key| key.time.is_finite() && key.value.is_finite());
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));

        Self {
            keyframes,
            interpolation,
            wrap,
        }
    }

    /// Симметричный обзор: 0 → +amplitude → -amplitude → 0 за `period` секунд, по кругу
    pub fn sweep(amplitude: f32, period: f32) -> Self {
        let period = period.max(f32::EPSILON);

        Self::new(
            vec![
                Keyframe::new(0.0, 0.0),
                Keyframe::new(period * 0.25, amplitude),
                Keyframe::new(period * 0.75, -amplitude),
                Keyframe::new(period, 0.0),
            ],
            Interpolation::Smooth,
            WrapMode::Loop,
        )
    }

    /// Восстанавливает инвариант сортировки (после десериализации)
    pub fn normalized(self) -> Self {
        Self::new(self.keyframes, self.interpolation, self.wrap)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_flat(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Отклонение (градусы) в момент `time`. Пустой паттерн = 0.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keyframes.first(), self.keyframes.last()) else {
            return 0.0;
        };

        let duration = last.time - first.time;
        if duration <= 0.0 || !time.is_finite() {
            return first.value;
        }

        let local = self.wrap_time(time - first.time, duration) + first.time;

        // Первый ключ строго правее local
        let right = self.keyframes.partition_point(|key| key.time <= local);
        if right == 0 {
            return first.value;
        }
        if right >= self.keyframes.len() {
            return last.value;
        }

        let a = self.keyframes[right - 1];
        let b = self.keyframes[right];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }

        let t = ((local - a.time) / span).clamp(0.0, 1.0);
        let factor = match self.interpolation {
            Interpolation::Linear => t,
            Interpolation::Smooth => t * t * (3.0 - 2.0 * t),
            Interpolation::Step => 0.0,
        };

        a.value + (b.value - a.value) * factor
    }

    fn wrap_time(&self, offset: f32, duration: f32) -> f32 {
        match self.wrap {
            WrapMode::Clamp => offset.clamp(0.0, duration),
            WrapMode::Loop => offset.rem_euclid(duration),
            WrapMode::PingPong => {
                let phase = offset.rem_euclid(duration * 2.0);
                if phase > duration {
                    duration * 2.0 - phase
                } else {
                    phase
                }
            }
        }
    }
}
