//! TargetTracker — spotted → detected → lost
//!
//! Transitions (раз в tick, против nearest-distance карты всего sweep):
//! - Новая цель (нет ни в одном наборе) → Spotted
//! - Spotted и skin_offset >= distance цели → Detected (волновой фронт дошёл до цели)
//! - Была в Spotted/Detected, но не найдена в этом tick → Lost (удаляется)
//!
//! Инвариант: entity максимум в одном наборе. Порядок transitions детерминирован:
//! сначала в порядке обнаружения, затем lost (сначала spotted, потом detected).

use bevy::prelude::*;

/// Цель в одном из наборов + дистанция последнего обнаружения
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedTarget {
    pub entity: Entity,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetTransition {
    Spotted(Entity),
    Detected(Entity),
    Lost(Entity),
}

impl TargetTransition {
    pub fn target(&self) -> Entity {
        match self {
            TargetTransition::Spotted(entity)
            | TargetTransition::Detected(entity)
            | TargetTransition::Lost(entity) => *entity,
        }
    }
}

/// Два непересекающихся набора целей (порядок = порядок попадания в набор)
#[derive(Debug, Clone, Default)]
pub struct TargetSets {
    spotted: Vec<TrackedTarget>,
    detected: Vec<TrackedTarget>,
}

impl TargetSets {
    pub fn spotted(&self) -> &[TrackedTarget] {
        &self.spotted
    }

    pub fn detected(&self) -> &[TrackedTarget] {
        &self.detected
    }

    pub fn is_empty(&self) -> bool {
        self.spotted.is_empty() && self.detected.is_empty()
    }

    pub fn is_spotted(&self, entity: Entity) -> bool {
        self.spotted.iter().any(|target| target.entity == entity)
    }

    pub fn is_detected(&self, entity: Entity) -> bool {
        self.detected.iter().any(|target| target.entity == entity)
    }

    /// Spotted, затем detected
    pub fn iter(&self) -> impl Iterator<Item = &TrackedTarget> + '_ {
        self.spotted.iter().chain(self.detected.iter())
    }

    /// Все цели по возрастанию дистанции (stable: при равенстве — порядок `iter()`)
    pub fn nearest_first(&self) -> Vec<TrackedTarget> {
        let mut targets: Vec<TrackedTarget> = self.iter().copied().collect();
        targets.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        targets
    }

    /// Применяет discoveries текущего tick, дописывает transitions в `transitions`
    ///
    /// `skin_offset` — значение предыдущего tick (VisualBlender обновляется после tracker'а).
    pub fn apply_discoveries(
        &mut self,
        discovered: &[(Entity, f32)],
        skin_offset: f32,
        transitions: &mut Vec<TargetTransition>,
    ) {
        for &(entity, distance) in discovered {
            if let Some(position) = self.spotted.iter().position(|target| target.entity == entity) {
                self.spotted[position].distance = distance;

                if skin_offset >= distance {
                    // Promotion: сначала удаляем из spotted, затем добавляем в detected
                    let target = self.spotted.remove(position);
                    self.detected.push(target);
                    transitions.push(TargetTransition::Detected(entity));
                }
            } else if let Some(target) = self.detected.iter_mut().find(|target| target.entity == entity) {
                target.distance = distance;
            } else {
                // Новая цель — текущий offset учтётся на следующем tick
                self.spotted.push(TrackedTarget { entity, distance });
                transitions.push(TargetTransition::Spotted(entity));
            }
        }

        let is_discovered = |entity: Entity| discovered.iter().any(|(found, _)| *found == entity);

        for target in self.spotted.iter().chain(self.detected.iter()) {
            if !is_discovered(target.entity) {
                transitions.push(TargetTransition::Lost(target.entity));
            }
        }

        self.spotted.retain(|target| is_discovered(target.entity));
        self.detected.retain(|target| is_discovered(target.entity));
    }

    /// Сброс без событий (перезапуск сенсора)
    pub fn clear(&mut self) {
        self.spotted.clear();
        self.detected.clear();
    }
}
