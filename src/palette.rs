//! 256-color RGB palettes and the COL palette codec.
//!
//! Two sibling on-disk variants share the `.col` extension:
//!
//! * **Animator** — exactly 768 bytes, 256 × 3-byte RGB entries with 6-bit
//!   channels (0–63) that are rescaled to 8-bit on load.
//! * **Animator Pro** — an 8-byte little-endian header (u32 file size,
//!   u16 magic `0xB123`, u16 version `0`) followed by raw 8-bit RGB triplets,
//!   capped at 256 entries.
//!
//! Disambiguation is by total file size: exactly 768 bytes means Animator,
//! anything else must parse as Animator Pro or the file is rejected. A read
//! error in the middle of the entry data truncates the palette at the last
//! complete entry instead of failing — legacy loaders were forgiving here and
//! callers rely on it.

use image::Rgba;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

/// Animator Pro file format identifier.
const PROCOL_MAGIC_NUMBER: u16 = 0xB123;

// ============================================================================
// PALETTE
// ============================================================================

/// An RGB color table with up to 256 entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<Rgba<u8>>,
}

impl Palette {
    pub const MAX_ENTRIES: usize = 256;

    /// Create a palette of `size` black, fully-opaque entries (capped at 256).
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![Rgba([0, 0, 0, 255]); size.min(Self::MAX_ENTRIES)],
        }
    }

    pub fn from_colors(colors: &[Rgba<u8>]) -> Self {
        Self {
            entries: colors[..colors.len().min(Self::MAX_ENTRIES)].to_vec(),
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> Option<Rgba<u8>> {
        self.entries.get(index).copied()
    }

    pub fn set_entry(&mut self, index: usize, color: Rgba<u8>) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = color;
        }
    }

    pub fn entries(&self) -> &[Rgba<u8>] {
        &self.entries
    }

    /// Index of the entry closest to `color` (RGB distance, alpha ignored).
    pub fn nearest_entry(&self, color: Rgba<u8>) -> usize {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, e) in self.entries.iter().enumerate() {
            let dr = e[0] as i32 - color[0] as i32;
            let dg = e[1] as i32 - color[1] as i32;
            let db = e[2] as i32 - color[2] as i32;
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(Self::MAX_ENTRIES)
    }
}

// ============================================================================
// COL CODEC
// ============================================================================

#[derive(Debug)]
pub enum ColError {
    Io(std::io::Error),
    InvalidFormat(String),
}

impl std::fmt::Display for ColError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColError::Io(e) => write!(f, "I/O error: {}", e),
            ColError::InvalidFormat(e) => write!(f, "Invalid COL format: {}", e),
        }
    }
}

impl std::error::Error for ColError {}

impl From<std::io::Error> for ColError {
    fn from(e: std::io::Error) -> Self {
        ColError::Io(e)
    }
}

/// 6-bit (0–63) to 8-bit (0–255) channel rescale. Exact at both ends:
/// 0 → 0, 63 → 255.
fn scale_6bits_to_8bits(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

/// Decode a COL palette from an in-memory buffer.
pub fn decode_col(bytes: &[u8]) -> Result<Palette, ColError> {
    read_col(&mut Cursor::new(bytes), bytes.len() as u64)
}

/// Decode a COL palette from a reader whose total size is already known
/// (the size is what disambiguates the two variants).
///
/// A read error inside the entry data is not fatal: the palette is returned
/// with the entries decoded so far and the rest left black.
pub fn read_col(reader: &mut impl Read, size: u64) -> Result<Palette, ColError> {
    if size == 0 {
        return Err(ColError::InvalidFormat("empty file".into()));
    }

    // Animator format: raw 6-bit entries, no header.
    if size == 768 {
        let mut pal = Palette::new(256);
        let mut rgb = [0u8; 3];
        for c in 0..256 {
            if reader.read_exact(&mut rgb).is_err() {
                break;
            }
            pal.set_entry(
                c,
                Rgba([
                    scale_6bits_to_8bits(rgb[0].min(63)),
                    scale_6bits_to_8bits(rgb[1].min(63)),
                    scale_6bits_to_8bits(rgb[2].min(63)),
                    255,
                ]),
            );
        }
        return Ok(pal);
    }

    // Animator Pro format.
    if size < 8 || (size - 8) % 3 != 0 {
        return Err(ColError::InvalidFormat(format!(
            "bad file size {} for Animator Pro palette",
            size
        )));
    }

    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    // Bytes 0..4 are the declared file size; legacy loaders ignore it and
    // trust the actual size, so we do too.
    let magic = u16::from_le_bytes([header[4], header[5]]);
    let version = u16::from_le_bytes([header[6], header[7]]);
    if magic != PROCOL_MAGIC_NUMBER {
        return Err(ColError::InvalidFormat(format!(
            "bad magic 0x{:04X} (expected 0x{:04X})",
            magic, PROCOL_MAGIC_NUMBER
        )));
    }
    if version != 0 {
        return Err(ColError::InvalidFormat(format!("unsupported version {}", version)));
    }

    let count = (((size - 8) / 3) as usize).min(Palette::MAX_ENTRIES);
    let mut pal = Palette::new(count);
    let mut rgb = [0u8; 3];
    for c in 0..count {
        if reader.read_exact(&mut rgb).is_err() {
            break;
        }
        pal.set_entry(c, Rgba([rgb[0], rgb[1], rgb[2], 255]));
    }
    Ok(pal)
}

/// Encode a palette as an Animator Pro COL file. Always emits 256 entries;
/// missing entries are written as black. Alpha is dropped.
pub fn encode_col(pal: &Palette) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 768);
    out.extend_from_slice(&(8u32 + 768).to_le_bytes());
    out.extend_from_slice(&PROCOL_MAGIC_NUMBER.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    for i in 0..Palette::MAX_ENTRIES {
        let c = pal.entry(i).unwrap_or(Rgba([0, 0, 0, 255]));
        out.extend_from_slice(&[c[0], c[1], c[2]]);
    }
    out
}

/// Write a palette as an Animator Pro COL file. A short write aborts and
/// surfaces the error; bytes already written are not rolled back.
pub fn write_col(pal: &Palette, writer: &mut impl Write) -> Result<(), ColError> {
    writer.write_all(&encode_col(pal))?;
    Ok(())
}

/// Load a COL palette file (either variant).
pub fn load_col_file(path: &Path) -> Result<Palette, ColError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    read_col(&mut BufReader::new(file), size)
}

/// Save a palette as an Animator Pro COL file.
pub fn save_col_file(pal: &Palette, path: &Path) -> Result<(), ColError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_col(pal, &mut writer)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// A reader that fails after yielding a fixed number of bytes.
    struct ShortReader<'a> {
        data: &'a [u8],
        pos: usize,
        limit: usize,
    }

    impl Read for ShortReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.limit {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk error"));
            }
            let n = buf.len().min(self.limit - self.pos).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn rainbow(n: usize) -> Palette {
        let mut pal = Palette::new(n);
        for i in 0..n {
            pal.set_entry(i, Rgba([i as u8, (i * 3) as u8, 255 - i as u8, 255]));
        }
        pal
    }

    #[test]
    fn roundtrip_full_palette() {
        let pal = rainbow(256);
        let decoded = decode_col(&encode_col(&pal)).unwrap();
        assert_eq!(decoded, pal);
    }

    #[test]
    fn roundtrip_drops_alpha() {
        let mut pal = Palette::new(256);
        pal.set_entry(7, Rgba([10, 20, 30, 42]));
        let decoded = decode_col(&encode_col(&pal)).unwrap();
        assert_eq!(decoded.entry(7), Some(Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn roundtrip_short_palette_pads_black() {
        let pal = rainbow(16);
        let decoded = decode_col(&encode_col(&pal)).unwrap();
        assert_eq!(decoded.size(), 256);
        assert_eq!(&decoded.entries()[..16], pal.entries());
        assert_eq!(decoded.entry(200), Some(Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn animator_max_channel_rescales_to_255() {
        let decoded = decode_col(&[63u8; 768]).unwrap();
        assert_eq!(decoded.size(), 256);
        for e in decoded.entries() {
            assert_eq!(*e, Rgba([255, 255, 255, 255]));
        }
    }

    #[test]
    fn animator_out_of_range_channel_is_clamped() {
        // 0xFF is out of 6-bit range; clamp to 63 then rescale.
        let decoded = decode_col(&[0xFFu8; 768]).unwrap();
        assert_eq!(decoded.entry(0), Some(Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn animator_zero_stays_zero() {
        let decoded = decode_col(&[0u8; 768]).unwrap();
        assert_eq!(decoded.entry(0), Some(Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn pro_rejects_bad_magic() {
        let mut bytes = encode_col(&Palette::default());
        bytes[4] = 0x24; // magic low byte
        assert!(matches!(decode_col(&bytes), Err(ColError::InvalidFormat(_))));
    }

    #[test]
    fn pro_rejects_bad_version() {
        let mut bytes = encode_col(&Palette::default());
        bytes[6] = 1;
        assert!(matches!(decode_col(&bytes), Err(ColError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_empty_and_misaligned_sizes() {
        assert!(decode_col(&[]).is_err());
        // 8-byte header + 4 entry bytes: not a multiple of 3.
        let mut bytes = encode_col(&Palette::default());
        bytes.truncate(12);
        assert!(decode_col(&bytes).is_err());
    }

    #[test]
    fn pro_caps_at_256_entries() {
        let mut bytes = encode_col(&rainbow(256));
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]); // two extra entries
        let decoded = read_col(&mut Cursor::new(&bytes), bytes.len() as u64).unwrap();
        assert_eq!(decoded.size(), 256);
    }

    #[test]
    fn truncated_read_is_partial_success() {
        let pal = rainbow(256);
        let bytes = encode_col(&pal);
        // Header + 10 complete entries, then the reader starts failing.
        let mut reader = ShortReader { data: &bytes, pos: 0, limit: 8 + 30 };
        let decoded = read_col(&mut reader, bytes.len() as u64).unwrap();
        assert_eq!(decoded.size(), 256);
        assert_eq!(&decoded.entries()[..10], &pal.entries()[..10]);
        // Entries past the failure point are left black.
        assert_eq!(decoded.entry(11), Some(Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn rescale_is_monotonic_and_exact_at_ends() {
        assert_eq!(scale_6bits_to_8bits(0), 0);
        assert_eq!(scale_6bits_to_8bits(63), 255);
        for v in 0..63u8 {
            assert!(scale_6bits_to_8bits(v) < scale_6bits_to_8bits(v + 1));
        }
    }

    #[test]
    fn nearest_entry_picks_exact_match() {
        let pal = rainbow(64);
        assert_eq!(pal.nearest_entry(Rgba([5, 15, 250, 255])), 5);
    }
}
