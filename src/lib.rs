//! argot - typed command-line option and argument parsing.
//!
//! This library turns a raw argument vector into typed option values and
//! positional argument values. Options and arguments are declared up front,
//! programmatically, from a field-descriptor list, or from a JSON manifest;
//! a single parse pass then binds tokens to the declared cells, which are
//! read back through typed, fallback-taking getters.

pub mod args;
pub mod config;
pub mod opts;
pub mod parser;
pub mod schema;
pub mod value;

pub use args::{ArgDeclareError, ArgumentRegistry, ArgumentSpec, BindError};
pub use config::{Manifest, ManifestError};
pub use opts::{DeclareError, OptionRegistry, OptionSpec};
pub use parser::{rearrange, Outcome, ParseError, Parser, Settings};
pub use schema::{bind_fields, FieldDescriptor, RuleMode, SchemaError};
pub use value::{parse_bool, Binding, CustomValue, Value, ValueCell, ValueError, ValueKind};
