//! Integrations Dev
//!
//! Tooling for integration authors:
//! - [`spec`] loads a configuration specification, expands its templates and
//!   validates it, collecting every error
//! - [`templates`] holds the reusable option templates
//! - [`example`] renders the commented example configuration files

pub mod error;
pub mod example;
pub mod spec;
pub mod templates;

pub use error::{Result, SpecError};
pub use example::{
    DESCRIPTION_LINE_LENGTH_LIMIT, ExampleConsumer, RenderedFiles, render, write_examples,
};
pub use spec::{ConfigSpec, OptionKind, SpecFile, SpecLoader, SpecOption, ValueSpec, ValueType};
pub use templates::TemplateLibrary;
