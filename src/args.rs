//! Positional argument declarations and binding.

use std::cell::Ref;
use std::collections::HashMap;

use thiserror::Error;

use crate::opts::valid_name;
use crate::value::{Binding, ValueCell, ValueKind};

/// Errors that can occur while declaring positional arguments.
///
/// Like option declaration errors, these are setup bugs and surface
/// immediately, never at parse time.
#[derive(Debug, Error)]
pub enum ArgDeclareError {
    #[error("invalid argument name: {0}")]
    InvalidName(String),

    #[error("duplicate argument name: {0}")]
    DuplicateArgName(String),

    #[error("array argument '{existing}' already defined; '{name}' cannot follow it")]
    ArrayArgAlreadyDefined { existing: String, name: String },

    #[error("required argument '{name}' cannot follow optional argument '{prior}'")]
    RequiredAfterOptional { name: String, prior: String },
}

/// Errors that can occur while binding positional tokens.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing required argument '{name}' at position {index}")]
    MissingArgument { name: String, index: usize },

    #[error("too many arguments: {0:?}")]
    TooManyArguments(Vec<String>),
}

/// One declared positional argument, bound by position rather than name.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    name: String,
    help: String,
    required: bool,
    arrayed: bool,
    index: usize,
}

impl ArgumentSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            help: String::new(),
            required: false,
            arrayed: false,
            index: 0,
        }
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = text.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// An arrayed argument consumes all remaining tokens and must be last.
    pub fn arrayed(mut self) -> Self {
        self.arrayed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_arrayed(&self) -> bool {
        self.arrayed
    }

    /// Position assigned at declaration time, equal to declaration order.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The ordered list of declared positional arguments for one scope.
#[derive(Default)]
pub struct ArgumentRegistry {
    specs: Vec<ArgumentSpec>,
    cells: HashMap<String, Binding>,
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next positional argument.
    ///
    /// Checks, in order: name validity, name uniqueness, that no arrayed
    /// argument was already declared, and that a required argument does not
    /// follow an optional one. The first violation wins.
    pub fn add(&mut self, mut spec: ArgumentSpec) -> Result<&ArgumentSpec, ArgDeclareError> {
        if !valid_name(&spec.name) {
            return Err(ArgDeclareError::InvalidName(spec.name));
        }
        if self.specs.iter().any(|s| s.name == spec.name) {
            return Err(ArgDeclareError::DuplicateArgName(spec.name));
        }
        if let Some(arrayed) = self.specs.iter().find(|s| s.arrayed) {
            return Err(ArgDeclareError::ArrayArgAlreadyDefined {
                existing: arrayed.name.clone(),
                name: spec.name,
            });
        }
        if spec.required {
            if let Some(optional) = self.specs.iter().find(|s| !s.required) {
                return Err(ArgDeclareError::RequiredAfterOptional {
                    name: spec.name,
                    prior: optional.name.clone(),
                });
            }
        }

        spec.index = self.specs.len();
        let cell = if spec.arrayed {
            ValueCell::repeated(ValueKind::String)
        } else {
            ValueCell::new(ValueKind::String)
        };
        self.cells.insert(spec.name.clone(), cell.into_shared());
        self.specs.push(spec);
        Ok(self.specs.last().unwrap())
    }

    /// Bind leftover positional tokens to the declared arguments in index
    /// order.
    ///
    /// Tokens are stored raw; typed coercion happens on read. Surplus tokens
    /// are an error under `strict`, otherwise they are returned to the caller.
    pub fn bind(&mut self, tokens: &[String], strict: bool) -> Result<Vec<String>, BindError> {
        let mut rest = tokens;
        for (pos, spec) in self.specs.iter().enumerate() {
            let required_left = self.specs[pos..].iter().filter(|s| s.required).count();
            if rest.len() < required_left {
                return Err(BindError::MissingArgument {
                    name: spec.name.clone(),
                    index: spec.index,
                });
            }
            let cell = &self.cells[&spec.name];
            if spec.arrayed {
                let mut cell = cell.borrow_mut();
                for token in rest {
                    cell.store(token);
                }
                rest = &[];
                break;
            }
            if rest.is_empty() {
                continue;
            }
            cell.borrow_mut().store(&rest[0]);
            rest = &rest[1..];
        }

        if !rest.is_empty() && strict {
            return Err(BindError::TooManyArguments(rest.to_vec()));
        }
        Ok(rest.to_vec())
    }

    pub fn lookup(&self, name: &str) -> Option<&ArgumentSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn by_index(&self, index: usize) -> Option<&ArgumentSpec> {
        self.specs.get(index)
    }

    /// Shared handle to an argument's cell.
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.cells.get(name).cloned()
    }

    /// Borrow an argument's cell for reading.
    pub fn value(&self, name: &str) -> Option<Ref<'_, ValueCell>> {
        self.cells.get(name).map(|b| b.borrow())
    }

    /// Declared arguments in index order, for an external help renderer.
    pub fn iter(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_assigns_indices_in_order() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("base-path").required()).unwrap();
        reg.add(ArgumentSpec::new("dir-names").arrayed()).unwrap();
        assert_eq!(reg.lookup("base-path").unwrap().index(), 0);
        assert_eq!(reg.lookup("dir-names").unwrap().index(), 1);
        assert_eq!(reg.by_index(1).unwrap().name(), "dir-names");
    }

    #[test]
    fn test_error_on_invalid_name() {
        let mut reg = ArgumentRegistry::new();
        let result = reg.add(ArgumentSpec::new("1st"));
        assert!(matches!(result, Err(ArgDeclareError::InvalidName(_))));
    }

    #[test]
    fn test_error_on_duplicate_name() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("input")).unwrap();
        let result = reg.add(ArgumentSpec::new("input"));
        assert!(matches!(result, Err(ArgDeclareError::DuplicateArgName(name)) if name == "input"));
    }

    #[test]
    fn test_error_on_argument_after_arrayed() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("files").arrayed()).unwrap();
        let result = reg.add(ArgumentSpec::new("more"));
        assert!(matches!(
            result,
            Err(ArgDeclareError::ArrayArgAlreadyDefined { existing, .. }) if existing == "files"
        ));
    }

    #[test]
    fn test_error_on_required_after_optional() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("maybe")).unwrap();
        let result = reg.add(ArgumentSpec::new("must").required());
        assert!(matches!(
            result,
            Err(ArgDeclareError::RequiredAfterOptional { prior, .. }) if prior == "maybe"
        ));
    }

    #[test]
    fn test_required_after_required_is_fine() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("first").required()).unwrap();
        reg.add(ArgumentSpec::new("second").required()).unwrap();
        reg.add(ArgumentSpec::new("third")).unwrap();
    }

    #[test]
    fn test_bind_required_plus_arrayed() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("base-path").required()).unwrap();
        reg.add(ArgumentSpec::new("dir-names").arrayed()).unwrap();

        let extra = reg.bind(&tokens(&["./proj", "a", "b"]), true).unwrap();
        assert!(extra.is_empty());
        assert_eq!(reg.value("base-path").unwrap().str_or(""), "./proj");
        assert_eq!(reg.value("dir-names").unwrap().strings(), vec!["a", "b"]);
    }

    #[test]
    fn test_bind_missing_required() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("base-path").required()).unwrap();
        reg.add(ArgumentSpec::new("dir-names").arrayed()).unwrap();

        let result = reg.bind(&[], true);
        assert!(matches!(
            result,
            Err(BindError::MissingArgument { name, index: 0 }) if name == "base-path"
        ));
    }

    #[test]
    fn test_bind_strict_rejects_surplus() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("only").required()).unwrap();

        let result = reg.bind(&tokens(&["a", "b", "c"]), true);
        assert!(matches!(
            result,
            Err(BindError::TooManyArguments(extra)) if extra == tokens(&["b", "c"])
        ));
    }

    #[test]
    fn test_bind_lenient_returns_surplus() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("only").required()).unwrap();

        let extra = reg.bind(&tokens(&["a", "b", "c"]), false).unwrap();
        assert_eq!(extra, tokens(&["b", "c"]));
        assert_eq!(reg.value("only").unwrap().str_or(""), "a");
    }

    #[test]
    fn test_bind_optional_left_unset() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("input").required()).unwrap();
        reg.add(ArgumentSpec::new("output")).unwrap();

        reg.bind(&tokens(&["in.txt"]), true).unwrap();
        assert!(!reg.value("output").unwrap().is_set());
        assert_eq!(reg.value("output").unwrap().str_or("fallback"), "fallback");
    }

    #[test]
    fn test_bind_empty_arrayed_is_empty_list() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("files").arrayed()).unwrap();

        reg.bind(&[], true).unwrap();
        assert!(reg.value("files").unwrap().strings().is_empty());
    }

    #[test]
    fn test_typed_read_with_fallback() {
        let mut reg = ArgumentRegistry::new();
        reg.add(ArgumentSpec::new("count").required()).unwrap();

        reg.bind(&tokens(&["not-a-number"]), true).unwrap();
        // Raw storage always succeeds; the coercion fallback applies on read.
        assert_eq!(reg.value("count").unwrap().int_or(5), 5);
        assert_eq!(reg.value("count").unwrap().str_or(""), "not-a-number");
    }
}
