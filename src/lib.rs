//! # tickplate
//!
//! A compiler for backtick templates: plain text interleaved with indented code lines and
//! inline `` `expression` `` markers. A template compiles once into a [`Template`] that renders
//! any number of data contexts.
//!
//! ```text
//! # Order for `name`
//!
//!     for (const item of items) {
//! - `item`
//!     }
//! ```
//!
//! See the [tickplate module](tickplate) for the compilation pipeline.

pub mod tickplate;

pub use tickplate::engine::{assemble, compile, compile_file, Options};
pub use tickplate::error::{CompilationError, Error, ReadError, RenderError};
pub use tickplate::synthesis::{synthesize, Template};
