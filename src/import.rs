//! Import pipeline: turning dropped file paths into layers of the
//! destination sprite.
//!
//! The generic file loader (format sniffing, sequence detection, progress
//! UI) is a collaborator behind [`DocumentLoader`]; this module owns the
//! batch loop around it — color-mode reconciliation, timeline growth,
//! anchor resolution and the ordered duplicate/shift/insert of every source
//! layer. Per-file loader failures are logged and skipped; a user cancel
//! stops the remaining batch. Nothing here aborts the enclosing command.

use crate::color::{ColorConverter, DitherPolicy};
use crate::doc::Document;
use crate::layer::{Frame, LayerId};
use crate::log_err;
use crate::sprite::Sprite;
use std::path::{Path, PathBuf};

// ============================================================================
// INSERTION RESOLVER
// ============================================================================

/// Where dropped layers go relative to the layer at the target index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerInsertion {
    Before,
    After,
}

/// Concrete insertion point: at most one of `before`/`after` is set, and
/// `group` is the parent that will receive the new layers (when both anchors
/// are `None` the caller appends to `group`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertionAnchors {
    pub before: Option<LayerId>,
    pub after: Option<LayerId>,
    pub group: LayerId,
}

/// Resolve `layer_index` (into the flattened layer list) plus a relative
/// policy into concrete anchors.
///
/// Dropping `Before` a group redirects into the group: as its last child,
/// or — for an empty group — as its sole child (both anchors `None`).
///
/// `layer_index` must be in bounds; an out-of-range index is a caller bug
/// and panics.
pub fn resolve_insertion(
    sprite: &Sprite,
    layer_index: usize,
    insert: LayerInsertion,
) -> InsertionAnchors {
    let all_layers = sprite.all_layers();
    assert!(
        layer_index < all_layers.len(),
        "insertion index {} out of bounds ({} layers)",
        layer_index,
        all_layers.len()
    );

    let tree = sprite.tree();
    let mut after = (insert == LayerInsertion::After).then(|| all_layers[layer_index]);
    let mut before = (insert == LayerInsertion::Before).then(|| all_layers[layer_index]);

    if let Some(b) = before
        && tree.is_group(b)
    {
        // The drop goes *into* the group rather than in front of it.
        if tree.layers_count(b) == 0 {
            return InsertionAnchors { before: None, after: None, group: b };
        }
        after = tree.last_layer(b);
        before = None;
    }

    let anchor = after.or(before).expect("one anchor is always set here");
    let group = tree.parent(anchor).expect("anchors always have a parent group");
    InsertionAnchors { before, after, group }
}

// ============================================================================
// LOADER COLLABORATOR
// ============================================================================

/// Hints passed to the external loader.
#[derive(Clone, Copy, Debug)]
pub struct LoadFlags {
    /// Also load companion data files next to the image.
    pub data_file: bool,
    /// Synthesize a palette when the format carries none.
    pub create_palette: bool,
    /// Treat numbered files as one image sequence.
    pub sequence: bool,
}

/// Outcome of loading one path (which may consume several, e.g. a sequence).
pub struct LoadResult {
    pub document: Option<Document>,
    /// Every path the loader consumed, the requested one included.
    pub consumed_paths: Vec<PathBuf>,
    pub error: Option<String>,
    pub user_cancelled: bool,
}

/// The external file-loading subsystem. The call may block on user
/// interaction (progress window, format prompts); the pipeline treats it as
/// a synchronous step.
pub trait DocumentLoader {
    fn load_document(&mut self, path: &Path, flags: LoadFlags) -> LoadResult;
}

// ============================================================================
// IMPORT PIPELINE
// ============================================================================

/// What one batch produced, for the command's undo record.
pub(crate) struct ImportOutcome {
    /// Layers created in the destination, in insertion order.
    pub created: Vec<LayerId>,
    /// Accumulated memory footprint of the created layers.
    pub size: usize,
    /// Last inserted layer, or the standing anchor if nothing was inserted.
    pub last_anchor: Option<LayerId>,
}

/// Drain `paths` into the destination document.
///
/// Anchors are resolved from `layer_index` for the first inserted document
/// and then advance over each inserted layer, so a later file's layers
/// always land after an earlier file's at the same drop point, preserving
/// input path order in the final tree.
pub(crate) fn run_import(
    dest: &mut Document,
    loader: &mut dyn DocumentLoader,
    converter: &dyn ColorConverter,
    paths: &mut Vec<PathBuf>,
    frame: Frame,
    layer_index: usize,
    insert: LayerInsertion,
) -> ImportOutcome {
    let flags = LoadFlags { data_file: true, create_palette: true, sequence: true };

    let mut created = Vec::new();
    let mut size = 0usize;
    let mut after: Option<LayerId> = None;
    let mut before: Option<LayerId> = None;
    let mut group: Option<LayerId> = None;

    while let Some(path) = paths.first().cloned() {
        let result = loader.load_document(&path, flags);

        // Remove every path this operation consumed (a sequence loader takes
        // several at once). The requested path always goes, even on failure.
        if result.consumed_paths.is_empty() {
            paths.retain(|p| *p != path);
        } else {
            paths.retain(|p| !result.consumed_paths.contains(p));
        }

        if result.user_cancelled {
            // The user backed out; whatever was inserted so far stands.
            break;
        }
        if let Some(err) = &result.error {
            log_err!("import of {:?} failed: {}", path, err);
        }
        let Some(mut src_doc) = result.document else {
            continue;
        };

        // The source must match the destination's color mode before its
        // layers can be adopted. Conversion is scoped to the source only.
        if src_doc.sprite.color_mode() != dest.sprite.color_mode() {
            converter.convert(&mut src_doc.sprite, dest.sprite.color_mode(), DitherPolicy::default());
        }

        // Grow the destination timeline if the source doesn't fit at the
        // target frame offset. Growth only; undo restores the old count.
        if frame + src_doc.sprite.total_frames() > dest.sprite.total_frames() {
            dest.sprite.set_total_frames(frame + src_doc.sprite.total_frames());
        }

        // First document resolves the drop point against the current tree;
        // later ones continue after the last inserted layer.
        if after.is_none() && before.is_none() {
            let anchors = resolve_insertion(&dest.sprite, layer_index, insert);
            after = anchors.after;
            before = anchors.before;
            group = Some(anchors.group);
        }
        let group_id = group.expect("group is set whenever anchors are");

        for src_id in src_doc.sprite.all_layers() {
            let copy = dest.sprite.tree_mut().duplicate_from(src_doc.sprite.tree(), src_id);
            dest.sprite.tree_mut().displace_frames(copy, frame);

            if let Some(a) = after {
                dest.sprite.tree_mut().insert_layer(group_id, copy, a);
                after = Some(copy);
            } else if let Some(b) = before {
                dest.sprite.tree_mut().insert_layer_before(group_id, copy, b);
                before = None;
                after = Some(copy);
            } else {
                dest.sprite.tree_mut().add_layer(group_id, copy);
                after = Some(copy);
            }
            size += dest.sprite.tree().mem_size(copy);
            created.push(copy);
        }
        // One coalesced invalidation per source document, not per layer.
        dest.sprite.tree_mut().increment_version(group_id);
    }

    ImportOutcome { created, size, last_anchor: after.or(before) }
}

// ============================================================================
// TESTS
// ============================================================================
