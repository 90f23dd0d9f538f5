//! JSON manifest parsing: declare a whole parsing scope from a document.

use serde::Deserialize;
use thiserror::Error;

use crate::args::{ArgDeclareError, ArgumentSpec};
use crate::opts::{DeclareError, OptionSpec};
use crate::parser::{Parser, Settings};
use crate::value::ValueKind;

/// The manifest format version this build understands.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported schema version {0} (supported: 1)")]
    UnsupportedSchemaVersion(u32),

    #[error(transparent)]
    Option(#[from] DeclareError),

    #[error(transparent)]
    Argument(#[from] ArgDeclareError),
}

/// Value kind of a manifest option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KindEntry {
    Bool,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
    #[default]
    String,
    Duration,
}

impl KindEntry {
    fn kind(self) -> ValueKind {
        match self {
            KindEntry::Bool => ValueKind::Bool,
            KindEntry::Int => ValueKind::Int,
            KindEntry::Int64 => ValueKind::Int64,
            KindEntry::Uint => ValueKind::Uint,
            KindEntry::Uint64 => ValueKind::Uint64,
            KindEntry::Float64 => ValueKind::Float64,
            KindEntry::String => ValueKind::String,
            KindEntry::Duration => ValueKind::Duration,
        }
    }
}

/// One option in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionEntry {
    /// Canonical long name.
    pub name: String,
    /// One-character aliases.
    #[serde(default)]
    pub shorts: Vec<char>,
    /// Value kind (default: string).
    #[serde(rename = "type", default)]
    pub kind: KindEntry,
    /// Accumulate a list across occurrences.
    #[serde(default)]
    pub repeated: bool,
    /// Default value, in text form.
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Excluded from generated help; parsing is unaffected.
    #[serde(default)]
    pub hidden: bool,
    /// Help text.
    pub help: Option<String>,
    /// Environment variable consulted when the argv leaves this unset.
    pub env: Option<String>,
}

/// One positional argument in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentEntry {
    pub name: String,
    pub help: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Consumes all remaining tokens; must be declared last.
    #[serde(default)]
    pub arrayed: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_strict() -> bool {
    true
}

/// Top-level manifest for one parsing scope.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Manifest format version (default: current).
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Name of the described interface.
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Reject surplus positional tokens (default: true).
    #[serde(default = "default_strict")]
    pub strict: bool,
    /// Run the rearrange pre-pass before parsing (default: false).
    #[serde(default)]
    pub rearrange: bool,
    #[serde(default)]
    pub options: Vec<OptionEntry>,
    #[serde(default)]
    pub arguments: Vec<ArgumentEntry>,
}

impl Manifest {
    /// Parse a JSON string into a Manifest.
    pub fn from_json(json: &str) -> Result<Manifest, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Build a parser for this manifest.
    ///
    /// Every entry goes through the registries' normal declaration paths, so
    /// a bad manifest fails here with the same errors programmatic
    /// declaration would produce.
    pub fn build(&self) -> Result<Parser, ManifestError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ManifestError::UnsupportedSchemaVersion(self.schema_version));
        }

        let mut parser = Parser::with_settings(Settings {
            strict: self.strict,
            rearrange: self.rearrange,
        });

        for entry in &self.options {
            let mut spec = OptionSpec::new(&entry.name, entry.kind.kind());
            for &short in &entry.shorts {
                spec = spec.short(short);
            }
            if entry.repeated {
                spec = spec.repeated();
            }
            if let Some(default) = &entry.default {
                spec = spec.default_str(default);
            }
            if entry.required {
                spec = spec.required();
            }
            if entry.hidden {
                spec = spec.hidden();
            }
            if let Some(help) = &entry.help {
                spec = spec.help(help);
            }
            if let Some(env) = &entry.env {
                spec = spec.env(env);
            }
            parser.declare(spec)?;
        }

        for entry in &self.arguments {
            let mut spec = ArgumentSpec::new(&entry.name);
            if let Some(help) = &entry.help {
                spec = spec.help(help);
            }
            if entry.required {
                spec = spec.required();
            }
            if entry.arrayed {
                spec = spec.arrayed();
            }
            parser.declare_arg(spec)?;
        }

        Ok(parser)
    }
}
