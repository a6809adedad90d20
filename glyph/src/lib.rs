pub mod ast;
pub mod compiler;
pub mod component;
pub mod config;
pub mod container;
pub mod context;
pub mod diagnostics;
pub mod frontmatter;
pub mod ids;
pub mod ir;
pub mod metadata;
pub mod references;
pub mod schema;
pub mod translate;

pub use compiler::{CompileOptions, Compiler};
pub use config::{CompilerConfig, ConfigError};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSource, Severity};
pub use ir::{Block, BlockData, CompilationResult, GlyphIR, Reference};

/// Compile one document with the default configuration.
pub fn compile(markdown: &str, options: &CompileOptions) -> CompilationResult {
    Compiler::new().compile(markdown, options)
}
