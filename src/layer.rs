//! The layer tree: an arena of layers and groups owned by the sprite.
//!
//! Nodes are addressed by [`LayerId`] handles into a single `Vec`; parent
//! links are plain `Option<LayerId>` back-references and a group's children
//! are an ordered `Vec<LayerId>`. Ownership is strictly top-down, so cycles
//! are structurally impossible, and detaching a layer never destroys it —
//! undo records keep detached subtrees alive by id so redo can re-attach
//! the identical nodes (same content, same content versions).

use image::RgbaImage;
use std::collections::BTreeMap;

/// Frame index inside a sprite's timeline.
pub type Frame = u32;

/// Handle to a layer inside a [`LayerTree`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(usize);

/// Content of a layer: pixels per frame, or an ordered list of children.
pub enum LayerKind {
    /// Sparse per-frame pixel store (a "cel" per frame that has content).
    Image { cels: BTreeMap<Frame, RgbaImage> },
    Group { children: Vec<LayerId> },
}

pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub kind: LayerKind,
    parent: Option<LayerId>,
    /// Bumped on every content mutation; dependents compare versions instead
    /// of diffing pixels.
    content_version: u64,
}

impl Layer {
    fn image(name: String) -> Self {
        Self {
            name,
            visible: true,
            opacity: 1.0,
            kind: LayerKind::Image { cels: BTreeMap::new() },
            parent: None,
            content_version: 0,
        }
    }

    fn group(name: String) -> Self {
        Self {
            name,
            visible: true,
            opacity: 1.0,
            kind: LayerKind::Group { children: Vec::new() },
            parent: None,
            content_version: 0,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group { .. })
    }

    pub fn content_version(&self) -> u64 {
        self.content_version
    }
}

// ============================================================================
// LAYER TREE
// ============================================================================

/// Arena-backed layer hierarchy with a root group.
///
/// The root group itself is never enumerated; `all_layers()` yields the
/// user-visible layers in depth-first order (a group before its children),
/// which is the stable positional-index contract used by insertion commands.
pub struct LayerTree {
    nodes: Vec<Layer>,
    root: LayerId,
}

impl LayerTree {
    pub fn new() -> Self {
        let root = Layer::group("__root__".into());
        Self { nodes: vec![root], root: LayerId(0) }
    }

    pub fn root(&self) -> LayerId {
        self.root
    }

    pub fn get(&self, id: LayerId) -> &Layer {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.nodes[id.0].parent
    }

    pub fn is_group(&self, id: LayerId) -> bool {
        self.nodes[id.0].is_group()
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate a detached image layer.
    pub fn alloc_image_layer(&mut self, name: impl Into<String>) -> LayerId {
        self.push(Layer::image(name.into()))
    }

    /// Allocate a detached group.
    pub fn alloc_group(&mut self, name: impl Into<String>) -> LayerId {
        self.push(Layer::group(name.into()))
    }

    fn push(&mut self, layer: Layer) -> LayerId {
        self.nodes.push(layer);
        LayerId(self.nodes.len() - 1)
    }

    // ------------------------------------------------------------------
    // Group operations
    // ------------------------------------------------------------------

    fn children(&self, group: LayerId) -> &[LayerId] {
        match &self.nodes[group.0].kind {
            LayerKind::Group { children } => children,
            LayerKind::Image { .. } => panic!("layer {:?} is not a group", group),
        }
    }

    fn children_mut(&mut self, group: LayerId) -> &mut Vec<LayerId> {
        match &mut self.nodes[group.0].kind {
            LayerKind::Group { children } => children,
            LayerKind::Image { .. } => panic!("layer {:?} is not a group", group),
        }
    }

    pub fn layers_count(&self, group: LayerId) -> usize {
        self.children(group).len()
    }

    pub fn last_layer(&self, group: LayerId) -> Option<LayerId> {
        self.children(group).last().copied()
    }

    /// Append `layer` as the last child of `group`.
    pub fn add_layer(&mut self, group: LayerId, layer: LayerId) {
        assert!(self.nodes[layer.0].parent.is_none(), "layer is already attached");
        self.children_mut(group).push(layer);
        self.nodes[layer.0].parent = Some(group);
    }

    /// Insert `layer` immediately following `after` among `group`'s children.
    pub fn insert_layer(&mut self, group: LayerId, layer: LayerId, after: LayerId) {
        assert!(self.nodes[layer.0].parent.is_none(), "layer is already attached");
        let pos = self.child_position(group, after);
        self.children_mut(group).insert(pos + 1, layer);
        self.nodes[layer.0].parent = Some(group);
    }

    /// Insert `layer` immediately preceding `before` among `group`'s children.
    pub fn insert_layer_before(&mut self, group: LayerId, layer: LayerId, before: LayerId) {
        assert!(self.nodes[layer.0].parent.is_none(), "layer is already attached");
        let pos = self.child_position(group, before);
        self.children_mut(group).insert(pos, layer);
        self.nodes[layer.0].parent = Some(group);
    }

    /// Detach `layer` from its parent. The node (and its subtree) stays
    /// alive in the arena; only the attachment is severed.
    pub fn remove_layer(&mut self, layer: LayerId) {
        let parent = self.nodes[layer.0].parent.expect("cannot remove a detached layer");
        let pos = self.child_position(parent, layer);
        self.children_mut(parent).remove(pos);
        self.nodes[layer.0].parent = None;
    }

    fn child_position(&self, group: LayerId, child: LayerId) -> usize {
        self.children(group)
            .iter()
            .position(|&c| c == child)
            .unwrap_or_else(|| panic!("{:?} is not a child of {:?}", child, group))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// The sibling immediately preceding `layer` in its parent group.
    pub fn prev_sibling(&self, layer: LayerId) -> Option<LayerId> {
        let parent = self.nodes[layer.0].parent?;
        let pos = self.child_position(parent, layer);
        if pos == 0 { None } else { Some(self.children(parent)[pos - 1]) }
    }

    /// The sibling immediately following `layer` in its parent group.
    pub fn next_sibling(&self, layer: LayerId) -> Option<LayerId> {
        let parent = self.nodes[layer.0].parent?;
        let pos = self.child_position(parent, layer);
        self.children(parent).get(pos + 1).copied()
    }

    /// Flattened depth-first enumeration of every layer and group under the
    /// root (the root itself excluded). A group precedes its children.
    pub fn all_layers(&self) -> Vec<LayerId> {
        let mut out = Vec::new();
        self.collect(self.root, &mut out);
        out
    }

    fn collect(&self, group: LayerId, out: &mut Vec<LayerId>) {
        for &child in self.children(group) {
            out.push(child);
            if self.is_group(child) {
                self.collect(child, out);
            }
        }
    }

    pub fn first_layer(&self) -> Option<LayerId> {
        self.children(self.root).first().copied()
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    pub fn set_cel(&mut self, layer: LayerId, frame: Frame, pixels: RgbaImage) {
        match &mut self.nodes[layer.0].kind {
            LayerKind::Image { cels } => {
                cels.insert(frame, pixels);
            }
            LayerKind::Group { .. } => panic!("groups have no cels"),
        }
        self.increment_version(layer);
    }

    pub fn cel(&self, layer: LayerId, frame: Frame) -> Option<&RgbaImage> {
        match &self.nodes[layer.0].kind {
            LayerKind::Image { cels } => cels.get(&frame),
            LayerKind::Group { .. } => None,
        }
    }

    /// Highest frame index that holds content anywhere in `layer`'s subtree,
    /// plus one. Zero for empty layers.
    pub fn frame_extent(&self, layer: LayerId) -> Frame {
        match &self.nodes[layer.0].kind {
            LayerKind::Image { cels } => cels.keys().next_back().map_or(0, |f| f + 1),
            LayerKind::Group { children } => children
                .iter()
                .map(|&c| self.frame_extent(c))
                .max()
                .unwrap_or(0),
        }
    }

    /// Shift all frame content of `layer` (recursively for groups) forward
    /// by `offset` frames.
    pub fn displace_frames(&mut self, layer: LayerId, offset: Frame) {
        if offset == 0 {
            return;
        }
        let group_children = match &mut self.nodes[layer.0].kind {
            LayerKind::Image { cels } => {
                let shifted: BTreeMap<Frame, RgbaImage> =
                    std::mem::take(cels).into_iter().map(|(f, img)| (f + offset, img)).collect();
                *cels = shifted;
                None
            }
            LayerKind::Group { children } => Some(children.clone()),
        };
        if let Some(children) = group_children {
            for child in children {
                self.displace_frames(child, offset);
            }
        }
        self.increment_version(layer);
    }

    pub fn increment_version(&mut self, layer: LayerId) {
        self.nodes[layer.0].content_version += 1;
    }

    /// Approximate heap footprint of `layer`'s subtree, in bytes.
    pub fn mem_size(&self, layer: LayerId) -> usize {
        let node = &self.nodes[layer.0];
        let own = node.name.len()
            + match &node.kind {
                LayerKind::Image { cels } => {
                    cels.values().map(|img| img.as_raw().len()).sum::<usize>()
                }
                LayerKind::Group { .. } => 0,
            };
        match &node.kind {
            LayerKind::Group { children } => {
                own + children.iter().map(|&c| self.mem_size(c)).sum::<usize>()
            }
            LayerKind::Image { .. } => own,
        }
    }

    // ------------------------------------------------------------------
    // Copy with remap
    // ------------------------------------------------------------------

    /// Deep-copy the subtree rooted at `src_id` in `src` into this arena,
    /// allocating fresh ids. The copy is returned detached.
    pub fn duplicate_from(&mut self, src: &LayerTree, src_id: LayerId) -> LayerId {
        let src_node = src.get(src_id);
        let copy = match &src_node.kind {
            LayerKind::Image { cels } => {
                let id = self.alloc_image_layer(src_node.name.clone());
                match &mut self.nodes[id.0].kind {
                    LayerKind::Image { cels: dst } => {
                        *dst = cels.clone();
                    }
                    LayerKind::Group { .. } => unreachable!(),
                }
                id
            }
            LayerKind::Group { children } => {
                let id = self.alloc_group(src_node.name.clone());
                for &child in children {
                    let child_copy = self.duplicate_from(src, child);
                    self.add_layer(id, child_copy);
                }
                id
            }
        };
        self.nodes[copy.0].visible = src_node.visible;
        self.nodes[copy.0].opacity = src_node.opacity;
        copy
    }
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(names: &[&str]) -> (LayerTree, Vec<LayerId>) {
        let mut tree = LayerTree::new();
        let ids: Vec<LayerId> = names
            .iter()
            .map(|n| {
                let id = tree.alloc_image_layer(*n);
                tree.add_layer(tree.root(), id);
                id
            })
            .collect();
        (tree, ids)
    }

    #[test]
    fn insert_after_and_before_keep_order() {
        let (mut tree, ids) = tree_with(&["a", "b"]);
        let x = tree.alloc_image_layer("x");
        tree.insert_layer(tree.root(), x, ids[0]);
        let y = tree.alloc_image_layer("y");
        tree.insert_layer_before(tree.root(), y, ids[1]);
        let names: Vec<&str> =
            tree.all_layers().iter().map(|&id| tree.get(id).name.as_str()).collect();
        assert_eq!(names, vec!["a", "x", "y", "b"]);
    }

    #[test]
    fn remove_detaches_but_keeps_node_alive() {
        let (mut tree, ids) = tree_with(&["a", "b", "c"]);
        tree.remove_layer(ids[1]);
        assert_eq!(tree.all_layers(), vec![ids[0], ids[2]]);
        assert_eq!(tree.parent(ids[1]), None);
        // Node content survives detachment and can be re-attached.
        assert_eq!(tree.get(ids[1]).name, "b");
        tree.add_layer(tree.root(), ids[1]);
        assert_eq!(tree.all_layers(), vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn all_layers_is_depth_first_group_before_children() {
        let mut tree = LayerTree::new();
        let a = tree.alloc_image_layer("a");
        tree.add_layer(tree.root(), a);
        let g = tree.alloc_group("g");
        tree.add_layer(tree.root(), g);
        let inner = tree.alloc_image_layer("inner");
        tree.add_layer(g, inner);
        let b = tree.alloc_image_layer("b");
        tree.add_layer(tree.root(), b);
        assert_eq!(tree.all_layers(), vec![a, g, inner, b]);
    }

    #[test]
    fn siblings() {
        let (tree, ids) = tree_with(&["a", "b", "c"]);
        assert_eq!(tree.prev_sibling(ids[0]), None);
        assert_eq!(tree.prev_sibling(ids[1]), Some(ids[0]));
        assert_eq!(tree.next_sibling(ids[1]), Some(ids[2]));
        assert_eq!(tree.next_sibling(ids[2]), None);
    }

    #[test]
    fn displace_frames_shifts_cels_and_bumps_version() {
        let (mut tree, ids) = tree_with(&["a"]);
        tree.set_cel(ids[0], 0, RgbaImage::new(2, 2));
        tree.set_cel(ids[0], 3, RgbaImage::new(2, 2));
        let v = tree.get(ids[0]).content_version();
        tree.displace_frames(ids[0], 5);
        assert!(tree.cel(ids[0], 0).is_none());
        assert!(tree.cel(ids[0], 5).is_some());
        assert!(tree.cel(ids[0], 8).is_some());
        assert_eq!(tree.frame_extent(ids[0]), 9);
        assert!(tree.get(ids[0]).content_version() > v);
    }

    #[test]
    fn duplicate_from_copies_subtree_with_fresh_ids() {
        let mut src = LayerTree::new();
        let g = src.alloc_group("g");
        src.add_layer(src.root(), g);
        let inner = src.alloc_image_layer("inner");
        src.add_layer(g, inner);
        src.set_cel(inner, 1, RgbaImage::new(4, 4));
        src.get_mut(inner).opacity = 0.5;

        let mut dst = LayerTree::new();
        let copy = dst.duplicate_from(&src, g);
        assert!(dst.is_group(copy));
        assert_eq!(dst.parent(copy), None);
        assert_eq!(dst.layers_count(copy), 1);
        let inner_copy = dst.last_layer(copy).unwrap();
        assert_eq!(dst.get(inner_copy).name, "inner");
        assert_eq!(dst.get(inner_copy).opacity, 0.5);
        assert!(dst.cel(inner_copy, 1).is_some());
        // Source untouched.
        assert_eq!(src.all_layers(), vec![g, inner]);
    }

    #[test]
    fn mem_size_counts_cel_bytes() {
        let (mut tree, ids) = tree_with(&["a"]);
        tree.set_cel(ids[0], 0, RgbaImage::new(8, 8));
        assert!(tree.mem_size(ids[0]) >= 8 * 8 * 4);
    }
}
