#![allow(clippy::result_large_err)]
//! kdl-core: KDL resource compiler core library.
//!
//! Compiles declarative resource type definitions and resource declarations
//! into packed big-endian binary payloads, grouped by output unit,
//! namespace and type.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`compile()`] / [`compile_str()`] -- lex, parse and encode a source tree
//! - [`Project`] -- compiled units, metadata and the type registry
//! - [`CompileOptions`], [`Format`] -- compilation settings
//! - [`Diagnostic`], [`ErrorKind`] -- the single error type of the pipeline
//! - [`Encoder`], [`Decoder`] -- payload packing against a [`TypeDefinition`]
//! - [`SourceProvider`] and [`ContainerWriter`] -- input and output seams

pub mod compile;
pub mod config;
pub mod decoder;
pub mod diagnostic;
pub mod encoder;
pub mod expectation;
pub mod hash;
pub mod interpreter;
pub mod lexer;
mod parser;
pub mod project;
pub mod reference;
pub mod source;
pub mod stream;
pub mod types;
pub mod value;
pub mod writer;

// ── Convenience re-exports: key types ────────────────────────────────

pub use config::{CompileOptions, Format};
pub use diagnostic::{Diagnostic, ErrorKind, Result};
pub use project::{Instance, Project, ProjectMetadata, ResourceEntry, Unit};
pub use reference::ResourceReference;
pub use types::{BinaryKind, TypeCode, TypeDefinition, TypeRegistry};
pub use value::{Rect, ValueContainer};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use compile::{compile, compile_str};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};
pub use writer::{write_project, ContainerWriter, DirectoryWriter};
