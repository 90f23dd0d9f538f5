//! The tokenizer/binder: a single left-to-right pass over an argument
//! vector, writing into the cells owned by the option and argument
//! registries.

use std::iter::Peekable;
use std::slice::Iter;

use thiserror::Error;

use crate::args::{ArgDeclareError, ArgumentRegistry, ArgumentSpec, BindError};
use crate::opts::{DeclareError, OptionRegistry, OptionSpec};
use crate::value::{parse_bool, Binding, ValueError, ValueKind};

/// Errors that can occur while parsing an argument vector.
///
/// Unlike declaration errors these are user-input errors: they are returned
/// as values so the caller can print a usage hint and exit cleanly.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("missing value for option: {0}")]
    MissingValue(String),

    #[error("invalid boolean value for option '{name}': {value}")]
    InvalidBool { name: String, value: String },

    #[error("invalid numeric value for option '{name}': {value}")]
    InvalidNumber { name: String, value: String },

    #[error("invalid duration value for option '{name}': {value}")]
    InvalidDuration { name: String, value: String },

    #[error("invalid value for option '{name}': {message}")]
    ValidationFailed { name: String, message: String },

    #[error("required option '{0}' was not provided")]
    MissingRequired(String),

    #[error(transparent)]
    Argument(#[from] BindError),
}

/// Outcome of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// All tokens bound; `extra` holds surplus positionals when the parser
    /// is not strict.
    Parsed { extra: Vec<String> },
    /// An undeclared `--help`/`-h` was seen. Not a failure: parsing stops
    /// so the caller can render usage text and exit zero.
    Help,
}

/// Caller-selected parsing behavior.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Reject surplus positional tokens instead of returning them.
    pub strict: bool,
    /// Run the `rearrange` pre-pass over the vector before parsing.
    pub rearrange: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict: true,
            rearrange: false,
        }
    }
}

fn looks_like_option(token: &str) -> bool {
    token.starts_with('-') && token != "-"
}

/// Pre-processing pass for vectors where positionals may precede options.
///
/// Returns a new vector: three-character short pairs are split (`-ab` becomes
/// `-a -b`), then the suffix starting at the first option-looking token is
/// moved to the front. The binder is a single left-to-right pass, so without
/// this `arg0 arg1 --opt val` would hand `--opt` to the positional tail.
pub fn rearrange(argv: &[String]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(argv.len());
    for token in argv {
        let bytes = token.as_bytes();
        if bytes.len() == 3
            && bytes[0] == b'-'
            && bytes[1].is_ascii_alphabetic()
            && bytes[2].is_ascii_alphabetic()
        {
            tokens.push(format!("-{}", bytes[1] as char));
            tokens.push(format!("-{}", bytes[2] as char));
            continue;
        }
        tokens.push(token.clone());
    }

    match tokens.iter().position(|t| looks_like_option(t)) {
        Some(first) if first > 0 => {
            let mut out = tokens[first..].to_vec();
            out.extend_from_slice(&tokens[..first]);
            out
        }
        _ => tokens,
    }
}

/// One parsing scope: an option registry, an argument registry, and the
/// settings that drive a `parse` call.
///
/// The lifecycle is declare, parse once, read. A failed parse leaves cells
/// partially updated, so a parser must not be reused after an error.
#[derive(Default)]
pub struct Parser {
    opts: OptionRegistry,
    args: ArgumentRegistry,
    settings: Settings,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Declare an option in this scope.
    pub fn declare(&mut self, spec: OptionSpec) -> Result<(), DeclareError> {
        self.opts.declare(spec)
    }

    /// Declare the next positional argument in this scope.
    pub fn declare_arg(&mut self, spec: ArgumentSpec) -> Result<(), ArgDeclareError> {
        self.args.add(spec).map(|_| ())
    }

    pub fn options(&self) -> &OptionRegistry {
        &self.opts
    }

    pub fn options_mut(&mut self) -> &mut OptionRegistry {
        &mut self.opts
    }

    pub fn arguments(&self) -> &ArgumentRegistry {
        &self.args
    }

    /// Walk the argument vector, classify each token, and bind values.
    ///
    /// Long options may carry an inline `=value`; short clusters longer than
    /// one character bundle boolean shorts; everything else accumulates into
    /// the positional tail, which is handed to the argument registry once the
    /// vector is exhausted. Environment fallbacks and the required-option
    /// check run last.
    pub fn parse(&mut self, argv: &[String]) -> Result<Outcome, ParseError> {
        let rearranged;
        let argv: &[String] = if self.settings.rearrange {
            rearranged = rearrange(argv);
            &rearranged
        } else {
            argv
        };

        let mut tail: Vec<String> = Vec::new();
        let mut iter = argv.iter().peekable();
        while let Some(token) = iter.next() {
            if !looks_like_option(token) {
                tail.push(token.clone());
                continue;
            }
            if let Some(body) = token.strip_prefix("--") {
                // A bare "--" is skipped; it does not terminate option
                // parsing.
                if body.is_empty() {
                    continue;
                }
                let (name, inline) = match body.split_once('=') {
                    Some((n, v)) => (n, Some(v)),
                    None => (body, None),
                };
                if self.bind_option(name, inline, &mut iter)? {
                    return Ok(Outcome::Help);
                }
            } else {
                let body = &token[1..];
                // "-ab=c" addresses an option named "ab"; "-a=c" stays a
                // cluster.
                match body.find('=').filter(|&at| at > 1) {
                    Some(at) => {
                        if self.bind_option(&body[..at], Some(&body[at + 1..]), &mut iter)? {
                            return Ok(Outcome::Help);
                        }
                    }
                    None if body.chars().count() > 1 => self.bind_cluster(body)?,
                    None => {
                        if self.bind_option(body, None, &mut iter)? {
                            return Ok(Outcome::Help);
                        }
                    }
                }
            }
        }

        let extra = self.args.bind(&tail, self.settings.strict)?;
        self.apply_env()?;
        self.check_required()?;
        Ok(Outcome::Parsed { extra })
    }

    /// Bind one resolved option occurrence. Returns true when an undeclared
    /// help name was seen.
    fn bind_option(
        &mut self,
        name: &str,
        inline: Option<&str>,
        iter: &mut Peekable<Iter<'_, String>>,
    ) -> Result<bool, ParseError> {
        let canonical = match self.opts.resolve(name) {
            Some(c) => c,
            None if name == "help" || name == "h" => return Ok(true),
            None => return Err(ParseError::UnknownOption(name.to_string())),
        };
        let binding = self.opts.binding(&canonical).unwrap();
        let is_bool = self.opts.lookup(&canonical).unwrap().kind() == ValueKind::Bool;

        if is_bool {
            match inline {
                Some(raw) => {
                    let flag = parse_bool(raw).map_err(|_| ParseError::InvalidBool {
                        name: canonical.clone(),
                        value: raw.to_string(),
                    })?;
                    binding.borrow_mut().set_bool(flag);
                }
                None => binding.borrow_mut().set_bool(true),
            }
        } else {
            let value = match inline {
                Some(raw) => raw.to_string(),
                None => match iter.peek() {
                    Some(next) if !looks_like_option(next.as_str()) => {
                        iter.next().unwrap().clone()
                    }
                    _ => return Err(ParseError::MissingValue(canonical)),
                },
            };
            binding
                .borrow_mut()
                .assign(&value)
                .map_err(|e| value_error(&canonical, e))?;
        }

        self.run_validator(&canonical, &binding)?;
        Ok(false)
    }

    /// Bind a bundled short cluster: every character is an independent
    /// boolean short.
    fn bind_cluster(&mut self, cluster: &str) -> Result<(), ParseError> {
        for c in cluster.chars() {
            let canonical = self
                .opts
                .resolve(&c.to_string())
                .ok_or_else(|| ParseError::UnknownOption(cluster.to_string()))?;
            if self.opts.lookup(&canonical).unwrap().kind() != ValueKind::Bool {
                // A value-taking short can't be satisfied inside a bundle.
                return Err(ParseError::MissingValue(canonical));
            }
            let binding = self.opts.binding(&canonical).unwrap();
            binding.borrow_mut().set_bool(true);
            self.run_validator(&canonical, &binding)?;
        }
        Ok(())
    }

    fn run_validator(&self, name: &str, binding: &Binding) -> Result<(), ParseError> {
        if let Some(validate) = self.opts.lookup(name).and_then(|s| s.validator_fn()) {
            let shown = binding.borrow().display();
            validate(&shown).map_err(|message| ParseError::ValidationFailed {
                name: name.to_string(),
                message,
            })?;
        }
        Ok(())
    }

    /// Source unset options from their declared environment variables.
    fn apply_env(&mut self) -> Result<(), ParseError> {
        let pending: Vec<(String, String)> = self
            .opts
            .iter()
            .filter(|spec| !self.opts.value(spec.name()).unwrap().is_set())
            .filter_map(|spec| {
                spec.env_var()
                    .map(|var| (spec.name().to_string(), var.to_string()))
            })
            .collect();

        for (name, var) in pending {
            let raw = match std::env::var(&var) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let binding = self.opts.binding(&name).unwrap();
            binding
                .borrow_mut()
                .assign(&raw)
                .map_err(|e| value_error(&name, e))?;
            self.run_validator(&name, &binding)?;
        }
        Ok(())
    }

    fn check_required(&self) -> Result<(), ParseError> {
        for spec in self.opts.iter() {
            if spec.is_required() && !self.opts.value(spec.name()).unwrap().is_set() {
                return Err(ParseError::MissingRequired(spec.name().to_string()));
            }
        }
        Ok(())
    }
}

fn value_error(name: &str, err: ValueError) -> ParseError {
    match err {
        ValueError::InvalidBool(value) => ParseError::InvalidBool {
            name: name.to_string(),
            value,
        },
        ValueError::InvalidNumber(value) => ParseError::InvalidNumber {
            name: name.to_string(),
            value,
        },
        ValueError::InvalidDuration(value) => ParseError::InvalidDuration {
            name: name.to_string(),
            value,
        },
        ValueError::Custom(message) => ParseError::ValidationFailed {
            name: name.to_string(),
            message,
        },
    }
}
