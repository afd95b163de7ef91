//! Incremental IPS Bundle loading.
//!
//! Bytes flow through three stages:
//! - [`Tokenizer`] turns arbitrarily split byte chunks into JSON tokens,
//! - [`JsonStreamParser`] assembles tokens into values and emits a [`ValueEvent`] for every
//!   completed value at any depth,
//! - [`DocumentBuilder`] folds those events into an [`IpsDocument`](ips_core::IpsDocument).
//!
//! The loader functions in this crate wire a chunk source (async stream, async reader, file,
//! iterator or slice) into that pipeline. The reader and file loaders need the default `fs` feature,
//! which pulls in tokio; disable it for `wasm32` builds. A transport or syntax failure aborts the whole load and no
//! partial document is returned.

mod event;
mod loader;
mod parser;
mod reconstructor;
mod tokenizer;

pub use event::{Key, Parent, ValueEvent, ValueSink};
#[cfg(feature = "fs")]
pub use loader::{load_file, load_reader};
pub use loader::{load_stream, parse_chunks, parse_slice, BundleStreamParser};
pub use parser::JsonStreamParser;
pub use reconstructor::DocumentBuilder;
pub use tokenizer::{Token, Tokenizer};
