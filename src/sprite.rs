//! The sprite: canvas dimensions, color mode, palette, timeline length and
//! the layer tree.

use crate::color::ColorMode;
use crate::layer::{Frame, LayerId, LayerTree};
use crate::palette::Palette;

pub struct Sprite {
    pub width: u32,
    pub height: u32,
    color_mode: ColorMode,
    palette: Palette,
    total_frames: Frame,
    tree: LayerTree,
    version: u64,
}

impl Sprite {
    pub fn new(width: u32, height: u32, color_mode: ColorMode) -> Self {
        Self {
            width,
            height,
            color_mode,
            palette: Palette::default(),
            total_frames: 1,
            tree: LayerTree::new(),
            version: 0,
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub(crate) fn set_color_mode(&mut self, mode: ColorMode) {
        self.color_mode = mode;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
        self.increment_version();
    }

    /// Timeline length. Always at least 1 and always large enough to hold
    /// every layer's frame content after a successful edit command.
    pub fn total_frames(&self) -> Frame {
        self.total_frames
    }

    /// Set the timeline length directly. Import only ever grows it; undo
    /// restores a previously captured value.
    pub fn set_total_frames(&mut self, frames: Frame) {
        assert!(frames >= 1, "a sprite always has at least one frame");
        self.total_frames = frames;
    }

    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut LayerTree {
        &mut self.tree
    }

    /// Flattened depth-first layer list (see [`LayerTree::all_layers`]).
    pub fn all_layers(&self) -> Vec<LayerId> {
        self.tree.all_layers()
    }

    pub fn first_layer(&self) -> Option<LayerId> {
        self.tree.first_layer()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
    }
}
