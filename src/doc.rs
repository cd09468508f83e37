//! The open document: identity, sprite, version counter and the observer bus.

use crate::layer::LayerId;
use crate::sprite::Sprite;
use uuid::Uuid;

/// What structurally happened to the layer tree.
///
/// The legacy engine funneled both insertions and removals through its
/// "after remove layer" hook because the downstream refresh logic is shared;
/// the event is tagged here instead so observers can tell the two apart while
/// still sharing a single payload shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocEventKind {
    LayersInserted,
    LayersRemoved,
}

/// Payload delivered to observers after a layer-tree mutation. `layer` is
/// the last inserted layer, or for removals the surviving layer preceding
/// the removed span (the natural place for a timeline cursor to land).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocEvent {
    pub kind: DocEventKind,
    pub layer: Option<LayerId>,
}

pub trait DocObserver {
    fn on_layers_changed(&mut self, ev: &DocEvent);
}

/// Single open document.
pub struct Document {
    pub id: Uuid,
    pub sprite: Sprite,
    version: u64,
    observers: Vec<Box<dyn DocObserver>>,
}

impl Document {
    pub fn new(sprite: Sprite) -> Self {
        Self {
            id: Uuid::new_v4(),
            sprite,
            version: 0,
            observers: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
    }

    pub fn add_observer(&mut self, observer: Box<dyn DocObserver>) {
        self.observers.push(observer);
    }

    /// Deliver `ev` to every observer. Events without an anchor layer are
    /// dropped: there is nothing for dependents to refresh against.
    pub fn notify_observers(&mut self, ev: DocEvent) {
        if ev.layer.is_none() {
            return;
        }
        for obs in &mut self.observers {
            obs.on_layers_changed(&ev);
        }
    }
}
