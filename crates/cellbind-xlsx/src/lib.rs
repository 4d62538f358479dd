//! # cellbind-xlsx
//!
//! XLSX (Office Open XML) writer and reader for cellbind.
//!
//! Every cell the writer emits goes through one [`WriteCellHook`], read from
//! the `write_cell` slot of this crate's [hook package](hooks::package). The
//! [`CellValueInjector`] wraps that hook to substitute precomputed values for
//! the cached result of formula cells.

pub mod element;
pub mod error;
pub mod hooks;
pub mod inject;
pub mod reader;
pub mod sink;
pub mod valuecache;
pub mod writer;

pub use element::Element;
pub use error::{XlsxError, XlsxResult};
pub use hooks::{CellContext, HookOverrideGuard, WriteCellHook, WRITE_CELL_POINT};
pub use inject::{inject_cached_value, CellValueInjector};
pub use reader::XlsxReader;
pub use sink::{CaptureSink, CellSink, OutputMode, XmlSink};
pub use valuecache::{CachedValue, ValueCache, ValueCacheKey};
pub use writer::{WriteOptions, XlsxWriter};
