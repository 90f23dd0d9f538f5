//! Option declarations and the per-scope option registry.

use std::cell::Ref;
use std::collections::HashMap;

use thiserror::Error;

use crate::value::{Binding, CustomValue, Value, ValueCell, ValueKind};

/// Errors that can occur while declaring options.
///
/// These indicate a bug in the declaring code, not bad user input, and are
/// expected to fail the program during setup, before any argv is read.
#[derive(Debug, Error)]
pub enum DeclareError {
    #[error("invalid option name: {0}")]
    InvalidName(String),

    #[error("duplicate option name: {0}")]
    DuplicateName(String),

    #[error("duplicate shortcut '{short}' on option '{name}'")]
    DuplicateShort { name: String, short: char },
}

/// Callback run against the string form of an option's value after each
/// assignment.
pub type Validator = Box<dyn Fn(&str) -> Result<(), String>>;

/// Check a declared name against the identifier pattern: a letter followed
/// by letters, digits, underscores, or hyphens.
pub(crate) fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// One declared option: canonical long name, shortcut aliases, value kind,
/// and the flags that drive binding.
///
/// Immutable once declared; only the associated cell changes during a parse.
pub struct OptionSpec {
    name: String,
    shorts: Vec<char>,
    kind: ValueKind,
    repeated: bool,
    default: Option<Value>,
    required: bool,
    hidden: bool,
    help: String,
    env: Option<String>,
    validator: Option<Validator>,
    custom: Option<Box<dyn CustomValue>>,
}

impl OptionSpec {
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            shorts: Vec::new(),
            kind,
            repeated: false,
            default: None,
            required: false,
            hidden: false,
            help: String::new(),
            env: None,
            validator: None,
            custom: None,
        }
    }

    /// Declare an option wired through a caller-defined parser.
    pub fn with_custom(name: &str, parser: Box<dyn CustomValue>) -> Self {
        let mut spec = Self::new(name, ValueKind::Custom);
        spec.custom = Some(parser);
        spec
    }

    pub fn short(mut self, short: char) -> Self {
        self.shorts.push(short);
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Convenience for defaults supplied as text (manifest and rule strings);
    /// typed readers coerce lazily.
    pub fn default_str(mut self, value: &str) -> Self {
        self.default = Some(Value::Str(value.to_string()));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = text.to_string();
        self
    }

    /// Name of the environment variable consulted when the token stream
    /// leaves this option unset.
    pub fn env(mut self, var: &str) -> Self {
        self.env = Some(var.to_string());
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + 'static,
    {
        self.validator = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorts(&self) -> &[char] {
        &self.shorts
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn validator_fn(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }
}

/// The set of declared options for one parsing scope.
///
/// Owns the name and shortcut indexes plus the value cell for every option.
/// A registry belongs to exactly one parser; nested scopes get their own.
#[derive(Default)]
pub struct OptionRegistry {
    order: Vec<String>,
    specs: HashMap<String, OptionSpec>,
    shorts: HashMap<char, String>,
    cells: HashMap<String, Binding>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an option, creating its value cell seeded with the default.
    pub fn declare(&mut self, spec: OptionSpec) -> Result<(), DeclareError> {
        self.declare_with(spec, None)
    }

    /// Register an option against a caller-supplied cell.
    pub fn declare_bound(&mut self, spec: OptionSpec, cell: Binding) -> Result<(), DeclareError> {
        self.declare_with(spec, Some(cell))
    }

    fn declare_with(
        &mut self,
        mut spec: OptionSpec,
        cell: Option<Binding>,
    ) -> Result<(), DeclareError> {
        if !valid_name(&spec.name) {
            return Err(DeclareError::InvalidName(spec.name));
        }
        if self.specs.contains_key(&spec.name) {
            return Err(DeclareError::DuplicateName(spec.name));
        }
        // A one-character name lives in the same alias space as shortcuts.
        if spec.name.len() == 1 {
            let c = spec.name.chars().next().unwrap();
            if self.shorts.contains_key(&c) {
                return Err(DeclareError::DuplicateShort { name: spec.name.clone(), short: c });
            }
        }
        for &c in &spec.shorts {
            if self.shorts.contains_key(&c) || self.specs.contains_key(c.to_string().as_str()) {
                return Err(DeclareError::DuplicateShort { name: spec.name.clone(), short: c });
            }
        }

        let custom = spec.custom.take();
        let binding = match cell {
            Some(binding) => {
                if let Some(parser) = custom {
                    binding.borrow_mut().attach_custom(parser);
                }
                binding
            }
            None => {
                let mut fresh = if spec.repeated {
                    ValueCell::repeated(spec.kind)
                } else {
                    ValueCell::new(spec.kind)
                };
                if let Some(parser) = custom {
                    fresh.attach_custom(parser);
                }
                fresh.into_shared()
            }
        };
        if let Some(default) = &spec.default {
            binding.borrow_mut().set_default(default.clone());
        }

        for &c in &spec.shorts {
            self.shorts.insert(c, spec.name.clone());
        }
        self.cells.insert(spec.name.clone(), binding);
        self.order.push(spec.name.clone());
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Resolve a bare long or short name (dashes already stripped) to the
    /// canonical long name.
    pub fn resolve(&self, bare: &str) -> Option<String> {
        if self.specs.contains_key(bare) {
            return Some(bare.to_string());
        }
        let mut chars = bare.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.shorts.get(&c).cloned(),
            _ => None,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(name)
    }

    /// Shared handle to an option's cell.
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.cells.get(name).cloned()
    }

    /// Borrow an option's cell for reading.
    pub fn value(&self, name: &str) -> Option<Ref<'_, ValueCell>> {
        self.cells.get(name).map(|b| b.borrow())
    }

    /// Declared options in declaration order, for an external help renderer.
    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.order.iter().map(move |name| &self.specs[name])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
