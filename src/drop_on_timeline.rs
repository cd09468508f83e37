//! Drop files on the timeline: load them as documents and adopt their layers
//! into the destination sprite at a chosen position and frame offset, as one
//! undoable command.
//!
//! The undo record is the list of created layers (by id, in creation order)
//! plus the timeline length captured before execute. Undo detaches those
//! exact layers and restores the length; redo re-attaches the same nodes at
//! a freshly resolved anchor. Layer nodes are never destroyed by undo — the
//! arena keeps them alive while the command record holds their ids, so redo
//! reuses identical objects and content versions.

use crate::doc::{DocEvent, DocEventKind, Document};
use crate::history::{Command, CommandError, EditorContext};
use crate::import::{LayerInsertion, resolve_insertion, run_import};
use crate::layer::{Frame, LayerId};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unexecuted,
    Executed,
    Undone,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Unexecuted => "unexecuted",
            State::Executed => "executed",
            State::Undone => "undone",
        }
    }
}

pub struct DropOnTimeline {
    /// Paths still pending import; drained to empty by `execute`.
    paths: Vec<PathBuf>,
    /// Frame offset at which source content lands.
    frame: Frame,
    /// Index into the flattened layer list of the drop target.
    layer_index: usize,
    insert: LayerInsertion,
    /// Layers this command created, in creation order — the exact-inverse
    /// set for undo.
    dropped_layers: Vec<LayerId>,
    /// Timeline length on the other side of the current state: before
    /// execute while executed, after execute while undone. Swapped (never
    /// recomputed) on every undo/redo so toggling is idempotent.
    previous_total_frames: Frame,
    /// Estimated footprint: path bytes plus created-layer content.
    size: usize,
    state: State,
}

impl DropOnTimeline {
    pub fn new(
        frame: Frame,
        layer_index: usize,
        insert: LayerInsertion,
        paths: Vec<PathBuf>,
    ) -> Self {
        let size = paths.iter().map(|p| p.as_os_str().len()).sum();
        Self {
            paths,
            frame,
            layer_index,
            insert,
            dropped_layers: Vec::new(),
            previous_total_frames: 0,
            size,
            state: State::Unexecuted,
        }
    }

    fn check_state(&self, operation: &'static str, expected: State) -> Result<(), CommandError> {
        if self.state != expected {
            return Err(CommandError::WrongState { operation, state: self.state.name() });
        }
        Ok(())
    }

    fn swap_total_frames(&mut self, doc: &mut Document) {
        let current = doc.sprite.total_frames();
        doc.sprite.set_total_frames(self.previous_total_frames);
        self.previous_total_frames = current;
    }
}

impl Command for DropOnTimeline {
    /// Run the import batch once. Per-file failures are logged and skipped
    /// and a user cancel stops the remaining files, but the command always
    /// ends up executed with whatever was inserted — there is no rollback
    /// of a partially processed batch.
    fn execute(
        &mut self,
        doc: &mut Document,
        ctx: &mut EditorContext<'_>,
    ) -> Result<(), CommandError> {
        self.check_state("execute", State::Unexecuted)?;

        self.previous_total_frames = doc.sprite.total_frames();

        let outcome = run_import(
            doc,
            ctx.loader,
            ctx.converter,
            &mut self.paths,
            self.frame,
            self.layer_index,
            self.insert,
        );
        self.dropped_layers = outcome.created;
        self.size += outcome.size;

        // One coalesced version bump for the whole batch.
        doc.sprite.increment_version();
        doc.increment_version();

        doc.notify_observers(DocEvent {
            kind: DocEventKind::LayersInserted,
            layer: outcome.last_anchor,
        });
        self.state = State::Executed;
        Ok(())
    }

    fn undo(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.check_state("undo", State::Executed)?;

        let mut layer_before = None;
        for &layer in &self.dropped_layers {
            layer_before = doc.sprite.tree().prev_sibling(layer);
            doc.sprite.tree_mut().remove_layer(layer);
        }
        self.swap_total_frames(doc);

        // Land the notification on the survivor preceding the removed span,
        // falling back to the tree's first layer.
        let layer_before = layer_before.or_else(|| doc.sprite.first_layer());
        doc.notify_observers(DocEvent { kind: DocEventKind::LayersRemoved, layer: layer_before });
        self.state = State::Undone;
        Ok(())
    }

    fn redo(&mut self, doc: &mut Document) -> Result<(), CommandError> {
        self.check_state("redo", State::Undone)?;

        self.swap_total_frames(doc);

        if self.dropped_layers.is_empty() {
            self.state = State::Executed;
            return Ok(());
        }

        // Anchors are recomputed against the current tree, not replayed;
        // the captured layer ids are re-attached as-is.
        let anchors = resolve_insertion(&doc.sprite, self.layer_index, self.insert);
        let mut after = anchors.after;
        let mut before = anchors.before;
        let group = anchors.group;

        for &layer in &self.dropped_layers {
            if let Some(a) = after {
                doc.sprite.tree_mut().insert_layer(group, layer, a);
                after = Some(layer);
            } else if let Some(b) = before {
                doc.sprite.tree_mut().insert_layer_before(group, layer, b);
                before = None;
                after = Some(layer);
            } else {
                doc.sprite.tree_mut().add_layer(group, layer);
                after = Some(layer);
            }
        }
        doc.notify_observers(DocEvent {
            kind: DocEventKind::LayersInserted,
            layer: after.or(before),
        });
        self.state = State::Executed;
        Ok(())
    }

    fn description(&self) -> String {
        match self.dropped_layers.len() {
            0 => "Drop on Timeline".to_string(),
            n => format!("Drop {} Layer(s) on Timeline", n),
        }
    }

    fn memory_size(&self) -> usize {
        self.size
    }
}
