//! Color modes and the color-mode reconciliation seam.
//!
//! The import pipeline needs source documents to match the destination's
//! color mode before their layers can be adopted. The actual conversion is a
//! collaborator behind [`ColorConverter`]; [`DefaultConverter`] is a small
//! built-in good enough for imports (per-pixel grayscale math, NeuQuant
//! palette construction for indexed targets). Fancy dithering lives outside
//! this crate.

use crate::layer::LayerKind;
use crate::palette::Palette;
use crate::sprite::Sprite;
use color_quant::NeuQuant;
use image::Rgba;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Rgba,
    Grayscale,
    Indexed,
}

/// Dithering applied while converting between color modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DitherPolicy {
    #[default]
    None,
    Ordered,
}

/// Converts a sprite's pixel data to a target color mode, in place.
///
/// Runs against the *source* document of an import only, inside that
/// document's own edit scope; the destination sprite is never touched.
pub trait ColorConverter {
    fn convert(&self, sprite: &mut Sprite, target: ColorMode, dither: DitherPolicy);
}

/// Built-in converter: luma-weighted grayscale, NeuQuant-built palette for
/// indexed targets, nearest-palette-entry mapping. Ignores `DitherPolicy`
/// beyond accepting it (no dither implemented).
pub struct DefaultConverter;

impl ColorConverter for DefaultConverter {
    fn convert(&self, sprite: &mut Sprite, target: ColorMode, _dither: DitherPolicy) {
        if sprite.color_mode() == target {
            return;
        }
        match target {
            ColorMode::Grayscale => to_grayscale(sprite),
            ColorMode::Indexed => to_indexed(sprite),
            ColorMode::Rgba => {
                // Grayscale and indexed cels already carry full RGBA data;
                // widening is a mode change only.
            }
        }
        sprite.set_color_mode(target);
        sprite.increment_version();
    }
}

fn to_grayscale(sprite: &mut Sprite) {
    for_each_cel_pixel(sprite, |px| {
        let luma = luma(px);
        Rgba([luma, luma, luma, px[3]])
    });
}

fn to_indexed(sprite: &mut Sprite) {
    // Gather a sample stream across all cels for the quantizer.
    let mut samples: Vec<u8> = Vec::new();
    let tree = sprite.tree();
    for id in tree.all_layers() {
        if let LayerKind::Image { cels } = &tree.get(id).kind {
            for img in cels.values() {
                samples.extend_from_slice(img.as_raw());
            }
        }
    }
    if samples.is_empty() {
        sprite.set_palette(Palette::default());
        return;
    }

    let quant = NeuQuant::new(10, Palette::MAX_ENTRIES, &samples);
    let map = quant.color_map_rgba();
    let mut pal = Palette::new(map.len() / 4);
    for (i, chunk) in map.chunks_exact(4).enumerate() {
        pal.set_entry(i, Rgba([chunk[0], chunk[1], chunk[2], 255]));
    }
    sprite.set_palette(pal);

    for_each_cel_pixel(sprite, |px| {
        let idx = quant.index_of(&px.0);
        let base = idx * 4;
        Rgba([map[base], map[base + 1], map[base + 2], px[3]])
    });
}

fn luma(px: Rgba<u8>) -> u8 {
    ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8
}

fn for_each_cel_pixel(sprite: &mut Sprite, f: impl Fn(Rgba<u8>) -> Rgba<u8>) {
    let ids = sprite.tree().all_layers();
    let tree = sprite.tree_mut();
    for id in ids {
        let mut touched = false;
        if let LayerKind::Image { cels } = &mut tree.get_mut(id).kind {
            for img in cels.values_mut() {
                for px in img.pixels_mut() {
                    *px = f(*px);
                }
                touched = true;
            }
        }
        if touched {
            tree.increment_version(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn sprite_with_pixels(pixels: &[Rgba<u8>]) -> Sprite {
        let mut sprite = Sprite::new(pixels.len() as u32, 1, ColorMode::Rgba);
        let layer = sprite.tree_mut().alloc_image_layer("px");
        let root = sprite.tree().root();
        sprite.tree_mut().add_layer(root, layer);
        let mut img = RgbaImage::new(pixels.len() as u32, 1);
        for (x, px) in pixels.iter().enumerate() {
            img.put_pixel(x as u32, 0, *px);
        }
        sprite.tree_mut().set_cel(layer, 0, img);
        sprite
    }

    #[test]
    fn grayscale_conversion_is_luma_weighted() {
        let mut sprite = sprite_with_pixels(&[Rgba([255, 0, 0, 255])]);
        DefaultConverter.convert(&mut sprite, ColorMode::Grayscale, DitherPolicy::default());
        assert_eq!(sprite.color_mode(), ColorMode::Grayscale);
        let layer = sprite.first_layer().unwrap();
        let px = sprite.tree().cel(layer, 0).unwrap().get_pixel(0, 0);
        assert_eq!(px[0], 76); // 255 * 299 / 1000
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn same_mode_conversion_is_a_no_op() {
        let mut sprite = sprite_with_pixels(&[Rgba([1, 2, 3, 4])]);
        let version = sprite.version();
        DefaultConverter.convert(&mut sprite, ColorMode::Rgba, DitherPolicy::default());
        assert_eq!(sprite.version(), version);
    }

    #[test]
    fn indexed_conversion_builds_a_palette_and_snaps_pixels() {
        let mut sprite = sprite_with_pixels(&[
            Rgba([255, 0, 0, 255]),
            Rgba([0, 255, 0, 255]),
            Rgba([0, 0, 255, 255]),
        ]);
        DefaultConverter.convert(&mut sprite, ColorMode::Indexed, DitherPolicy::default());
        assert_eq!(sprite.color_mode(), ColorMode::Indexed);
        assert!(sprite.palette().size() > 0);
        // Every pixel now matches some palette entry exactly.
        let layer = sprite.first_layer().unwrap();
        let img = sprite.tree().cel(layer, 0).unwrap();
        for px in img.pixels() {
            let idx = sprite.palette().nearest_entry(*px);
            let entry = sprite.palette().entry(idx).unwrap();
            assert_eq!(&entry.0[..3], &px.0[..3]);
        }
    }
}
