//! Lifecycle события сенсора
//!
//! Два канала доставки, оба синхронно в tick'е transition'а:
//! - Bevy `Events<FieldOfViewEvent>` (системы хоста читают через EventReader)
//! - `TargetListeners` на entity сенсора — callbacks в порядке регистрации

use bevy::prelude::*;

use super::tracker::TargetTransition;

/// Transition цели у конкретного сенсора
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOfViewEvent {
    /// Цель впервые попала в конус
    TargetSpotted {
        /// Entity сенсора
        observer: Entity,
        /// Entity цели
        target: Entity,
    },

    /// Волновой фронт дошёл до цели
    TargetDetected { observer: Entity, target: Entity },

    /// Цель пропала из конуса (из spotted или detected)
    TargetLost { observer: Entity, target: Entity },
}

impl FieldOfViewEvent {
    pub fn from_transition(observer: Entity, transition: TargetTransition) -> Self {
        match transition {
            TargetTransition::Spotted(target) => FieldOfViewEvent::TargetSpotted { observer, target },
            TargetTransition::Detected(target) => FieldOfViewEvent::TargetDetected { observer, target },
            TargetTransition::Lost(target) => FieldOfViewEvent::TargetLost { observer, target },
        }
    }

    pub fn observer(&self) -> Entity {
        match self {
            FieldOfViewEvent::TargetSpotted { observer, .. }
            | FieldOfViewEvent::TargetDetected { observer, .. }
            | FieldOfViewEvent::TargetLost { observer, .. } => *observer,
        }
    }

    pub fn target(&self) -> Entity {
        match self {
            FieldOfViewEvent::TargetSpotted { target, .. }
            | FieldOfViewEvent::TargetDetected { target, .. }
            | FieldOfViewEvent::TargetLost { target, .. } => *target,
        }
    }
}

pub type TargetListener = Box<dyn FnMut(&FieldOfViewEvent) + Send + Sync>;

/// Синхронные подписчики сенсора
///
/// Вызываются после того, как transitions tick'а применены к наборам целей.
/// Listener получает только копию события — мутировать наборы он не может.
#[derive(Component, Default)]
pub struct TargetListeners {
    listeners: Vec<TargetListener>,
}

impl TargetListeners {
    pub fn with(mut self, listener: impl FnMut(&FieldOfViewEvent) + Send + Sync + 'static) -> Self {
        self.register(listener);
        self
    }

    pub fn register(&mut self, listener: impl FnMut(&FieldOfViewEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn notify(&mut self, event: &FieldOfViewEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for TargetListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetListeners")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
