//! Building option declarations from a field-descriptor list.
//!
//! Callers with a record-like settings type describe each field as a
//! `FieldDescriptor` (name, value kind, rule string, storage cell) and hand
//! the list here. The rule string is parsed with one of two small grammars
//! and every resulting option goes through the registry's normal `declare`
//! path, so the usual declaration invariants apply either way.

use thiserror::Error;

use crate::opts::{DeclareError, OptionRegistry, OptionSpec};
use crate::value::{parse_bool, Binding, ValueKind};

/// Errors that can occur while binding a field list.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid rule syntax on field '{field}': {detail}")]
    InvalidTagSyntax { field: String, detail: String },

    #[error("field '{0}' has no storage cell attached")]
    NilStorage(String),

    #[error(transparent)]
    Declare(#[from] DeclareError),
}

/// Which rule grammar a field list uses.
///
/// `Named` rules are `;`-separated `key=value` pairs; `Simple` rules are the
/// positional form `desc[;required][;default][;shorts]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMode {
    Named,
    Simple,
}

/// One field of a caller's settings record.
///
/// The descriptor list is built by the caller (by hand, a builder, or
/// generated code); this module only consumes it.
pub struct FieldDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub repeated: bool,
    pub rule: String,
    pub storage: Option<Binding>,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: ValueKind, rule: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            repeated: false,
            rule: rule.to_string(),
            storage: None,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn storage(mut self, cell: Binding) -> Self {
        self.storage = Some(cell);
        self
    }
}

/// Everything a rule string can carry.
#[derive(Debug, Default)]
struct RuleParts {
    name: Option<String>,
    desc: String,
    shorts: Vec<char>,
    required: bool,
    default: Option<String>,
}

/// Declare an option for every descriptor in `fields`.
///
/// The option name comes from the rule's `name` entry when present,
/// otherwise from the field identifier converted to kebab-case.
pub fn bind_fields(
    registry: &mut OptionRegistry,
    fields: Vec<FieldDescriptor>,
    mode: RuleMode,
) -> Result<(), SchemaError> {
    for field in fields {
        let storage = field
            .storage
            .ok_or_else(|| SchemaError::NilStorage(field.name.clone()))?;
        let parts = match mode {
            RuleMode::Named => parse_named_rule(&field.name, &field.rule)?,
            RuleMode::Simple => parse_simple_rule(&field.name, &field.rule)?,
        };

        let name = parts.name.unwrap_or_else(|| kebab_case(&field.name));
        let mut spec = OptionSpec::new(&name, field.kind).help(&parts.desc);
        for &c in &parts.shorts {
            spec = spec.short(c);
        }
        if field.repeated {
            spec = spec.repeated();
        }
        if parts.required {
            spec = spec.required();
        }
        if let Some(default) = &parts.default {
            spec = spec.default_str(default);
        }
        registry.declare_bound(spec, storage)?;
    }
    Ok(())
}

fn parse_named_rule(field: &str, rule: &str) -> Result<RuleParts, SchemaError> {
    let mut parts = RuleParts::default();
    for entry in rule.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            SchemaError::InvalidTagSyntax {
                field: field.to_string(),
                detail: format!("missing '=' in '{}'", entry),
            }
        })?;
        match key.trim() {
            "name" => parts.name = Some(value.to_string()),
            "desc" => parts.desc = value.to_string(),
            "shorts" => parts.shorts = parse_shorts(field, value)?,
            "required" => {
                parts.required = parse_bool(value).map_err(|_| SchemaError::InvalidTagSyntax {
                    field: field.to_string(),
                    detail: format!("bad boolean '{}' for 'required'", value),
                })?
            }
            "default" => {
                if !value.is_empty() {
                    parts.default = Some(value.to_string());
                }
            }
            unknown => {
                return Err(SchemaError::InvalidTagSyntax {
                    field: field.to_string(),
                    detail: format!("unknown key '{}'", unknown),
                })
            }
        }
    }
    Ok(parts)
}

fn parse_simple_rule(field: &str, rule: &str) -> Result<RuleParts, SchemaError> {
    let mut parts = RuleParts::default();
    for (pos, entry) in rule.split(';').enumerate() {
        match pos {
            0 => parts.desc = entry.to_string(),
            1 => {
                let entry = entry.trim();
                parts.required = if entry.is_empty() {
                    false
                } else if entry == "required" {
                    true
                } else {
                    parse_bool(entry).map_err(|_| SchemaError::InvalidTagSyntax {
                        field: field.to_string(),
                        detail: format!("bad required marker '{}'", entry),
                    })?
                };
            }
            2 => {
                if !entry.is_empty() {
                    parts.default = Some(entry.to_string());
                }
            }
            3 => parts.shorts = parse_shorts(field, entry)?,
            _ => {
                return Err(SchemaError::InvalidTagSyntax {
                    field: field.to_string(),
                    detail: format!("unexpected trailing component '{}'", entry),
                })
            }
        }
    }
    Ok(parts)
}

fn parse_shorts(field: &str, value: &str) -> Result<Vec<char>, SchemaError> {
    let mut shorts = Vec::new();
    for piece in value.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let mut chars = piece.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => shorts.push(c),
            _ => {
                return Err(SchemaError::InvalidTagSyntax {
                    field: field.to_string(),
                    detail: format!("shortcut '{}' is not a single character", piece),
                })
            }
        }
    }
    Ok(shorts)
}

/// Derive an option name from a field identifier: `BasePath` and
/// `base_path` both become `base-path`.
pub fn kebab_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    for (i, c) in identifier.chars().enumerate() {
        if c == '_' {
            out.push('-');
        } else if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueCell};

    fn cell(kind: ValueKind) -> Binding {
        ValueCell::new(kind).into_shared()
    }

    #[test]
    fn test_simple_rule_full_form() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("retries", ValueKind::Int, "int option message;required;;i")
            .storage(cell(ValueKind::Int));
        bind_fields(&mut reg, vec![field], RuleMode::Simple).unwrap();

        let spec = reg.lookup("retries").unwrap();
        assert_eq!(spec.help_text(), "int option message");
        assert!(spec.is_required());
        assert_eq!(spec.shorts(), &['i']);
        assert!(spec.default().is_none());
    }

    #[test]
    fn test_simple_rule_default_and_bool_marker() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("log_level", ValueKind::String, "logging level;false;info;l")
            .storage(cell(ValueKind::String));
        bind_fields(&mut reg, vec![field], RuleMode::Simple).unwrap();

        let spec = reg.lookup("log-level").unwrap();
        assert!(!spec.is_required());
        assert_eq!(spec.default(), Some(&Value::Str("info".to_string())));
        assert_eq!(reg.value("log-level").unwrap().str_or(""), "info");
    }

    #[test]
    fn test_simple_rule_desc_only() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("verbose", ValueKind::Bool, "turn up the noise")
            .storage(cell(ValueKind::Bool));
        bind_fields(&mut reg, vec![field], RuleMode::Simple).unwrap();
        let spec = reg.lookup("verbose").unwrap();
        assert_eq!(spec.help_text(), "turn up the noise");
        assert!(!spec.is_required());
    }

    #[test]
    fn test_named_rule() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new(
            "OutputPath",
            ValueKind::String,
            "name=out;desc=where results go;shorts=o;required=true;default=./out",
        )
        .storage(cell(ValueKind::String));
        bind_fields(&mut reg, vec![field], RuleMode::Named).unwrap();

        let spec = reg.lookup("out").unwrap();
        assert_eq!(spec.help_text(), "where results go");
        assert_eq!(spec.shorts(), &['o']);
        assert!(spec.is_required());
        assert_eq!(spec.default(), Some(&Value::Str("./out".to_string())));
    }

    #[test]
    fn test_named_rule_missing_equals() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("broken", ValueKind::String, "desc=x;required")
            .storage(cell(ValueKind::String));
        let result = bind_fields(&mut reg, vec![field], RuleMode::Named);
        assert!(matches!(
            result,
            Err(SchemaError::InvalidTagSyntax { field, .. }) if field == "broken"
        ));
    }

    #[test]
    fn test_named_rule_unknown_key() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("broken", ValueKind::String, "colour=red")
            .storage(cell(ValueKind::String));
        let result = bind_fields(&mut reg, vec![field], RuleMode::Named);
        assert!(matches!(result, Err(SchemaError::InvalidTagSyntax { .. })));
    }

    #[test]
    fn test_missing_storage() {
        let mut reg = OptionRegistry::new();
        let field = FieldDescriptor::new("orphan", ValueKind::String, "no home");
        let result = bind_fields(&mut reg, vec![field], RuleMode::Simple);
        assert!(matches!(
            result,
            Err(SchemaError::NilStorage(field)) if field == "orphan"
        ));
    }

    #[test]
    fn test_kebab_case_fallback() {
        assert_eq!(kebab_case("basePath"), "base-path");
        assert_eq!(kebab_case("BasePath"), "base-path");
        assert_eq!(kebab_case("base_path"), "base-path");
        assert_eq!(kebab_case("simple"), "simple");
    }

    #[test]
    fn test_registry_invariants_apply_to_schema_fields() {
        let mut reg = OptionRegistry::new();
        reg.declare(OptionSpec::new("verbose", ValueKind::Bool).short('v'))
            .unwrap();
        let field = FieldDescriptor::new("Version", ValueKind::Bool, "name=version;shorts=v")
            .storage(cell(ValueKind::Bool));
        let result = bind_fields(&mut reg, vec![field], RuleMode::Named);
        assert!(matches!(
            result,
            Err(SchemaError::Declare(DeclareError::DuplicateShort { short: 'v', .. }))
        ));
    }

    #[test]
    fn test_storage_is_shared_with_caller() {
        let mut reg = OptionRegistry::new();
        let held = cell(ValueKind::String);
        let field = FieldDescriptor::new("target", ValueKind::String, "build target")
            .storage(held.clone());
        bind_fields(&mut reg, vec![field], RuleMode::Simple).unwrap();

        reg.binding("target").unwrap().borrow_mut().assign("wasm").unwrap();
        assert_eq!(held.borrow().str_or(""), "wasm");
    }

    #[test]
    fn test_custom_kind_field_uses_capability() {
        use crate::value::CustomValue;
        use std::any::Any;

        #[derive(Debug, Default)]
        struct Level(u8);

        impl CustomValue for Level {
            fn set(&mut self, raw: &str) -> Result<(), String> {
                raw.parse::<u8>().map(|n| self.0 = n).map_err(|e| e.to_string())
            }

            fn value(&self) -> String {
                self.0.to_string()
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let mut reg = OptionRegistry::new();
        let held = ValueCell::custom(Box::new(Level::default())).into_shared();
        let field = FieldDescriptor::new("level", ValueKind::Custom, "nesting level")
            .storage(held.clone());
        bind_fields(&mut reg, vec![field], RuleMode::Simple).unwrap();

        reg.binding("level").unwrap().borrow_mut().assign("7").unwrap();
        let cell = held.borrow();
        let level = cell.custom_ref().unwrap().as_any().downcast_ref::<Level>().unwrap();
        assert_eq!(level.0, 7);
    }
}
