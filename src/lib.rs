//! rasterdoc — the document model core of a raster image editor.
//!
//! The crate owns the mutable document tree (sprite → layer tree → frames)
//! and the transactional edit commands that mutate it. The centerpiece is
//! [`drop_on_timeline::DropOnTimeline`]: dropping imported files onto the
//! timeline as an atomic, exactly-invertible insertion of new layers/frames.
//! A small self-contained sibling is the COL palette codec in [`palette`].
//!
//! The GUI, the generic file loader and the color quantizer are collaborators
//! behind traits ([`import::DocumentLoader`], [`color::ColorConverter`]);
//! this crate never renders or composites anything.

pub mod color;
pub mod doc;
pub mod drop_on_timeline;
pub mod history;
pub mod import;
pub mod layer;
pub mod logger;
pub mod palette;
pub mod sprite;

pub use color::{ColorConverter, ColorMode, DefaultConverter, DitherPolicy};
pub use doc::{DocEvent, DocEventKind, DocObserver, Document};
pub use drop_on_timeline::DropOnTimeline;
pub use history::{Command, CommandError, EditorContext, HistoryManager};
pub use import::{DocumentLoader, LayerInsertion, LoadFlags, LoadResult};
pub use layer::{Frame, Layer, LayerId, LayerKind, LayerTree};
pub use palette::Palette;
pub use sprite::Sprite;
