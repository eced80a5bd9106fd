//! Symir rendering: rule validation and lowering to logic-programming dialects.
//!
//! ```text
//!   Rule ──▶ RuleValidator (view + library) ──▶ Renderer (dialect) ──▶ text
//! ```
//!
//! [`RenderPipeline`] resolves a dialect from a [`RendererRegistry`] once and
//! runs the validator before every render. ProbLog and Prolog are
//! implemented; Datalog and Cypher are registered stubs that fail with
//! [`RenderError::UnsupportedDialect`].

pub mod config;
pub mod error;
pub mod library;
pub mod naming;
pub mod pipeline;
pub mod probability;
pub mod renderer;
pub mod validator;

pub use config::RenderConfig;
pub use error::{LibraryError, PipelineError, RenderError, ValidationError};
pub use library::{Library, LibraryKind, LibraryRuntime, LibrarySpec};
pub use naming::VarNamer;
pub use pipeline::{RenderPipeline, RendererRegistry};
pub use probability::{MissingProbPolicy, ProbSource, ProbabilityConfig};
pub use renderer::{ProbLogRenderer, PrologRenderer, RenderContext, Renderer, StubRenderer};
pub use validator::RuleValidator;
