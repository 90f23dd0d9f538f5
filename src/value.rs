//! Typed value cells backing declared options and arguments.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when converting a raw token into a typed value.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid boolean value: {0}")]
    InvalidBool(String),

    #[error("invalid numeric value: {0}")]
    InvalidNumber(String),

    #[error("invalid duration value: {0}")]
    InvalidDuration(String),

    #[error("{0}")]
    Custom(String),
}

/// The scalar kind of a cell. Whether a cell accumulates a list of these
/// is tracked separately by its `repeated` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
    String,
    Duration,
    Custom,
}

/// One concrete value held by a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Int64(i64),
    Uint(u32),
    Uint64(u64),
    Float64(f64),
    Str(String),
    Duration(Duration),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Uint(n) => write!(f, "{}", n),
            Value::Uint64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// Parse the boolean spellings accepted on the command line.
///
/// Accepts `1`/`on`/`yes`/`true` and `0`/`off`/`no`/`false`, case-insensitive.
pub fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        _ => Err(ValueError::InvalidBool(raw.to_string())),
    }
}

/// Extension point for caller-defined scalar types.
///
/// Implementors receive the raw token in `set` and render their current
/// state in `value`. `as_any` allows the caller to recover the concrete
/// type after parsing.
pub trait CustomValue: fmt::Debug {
    fn set(&mut self, raw: &str) -> Result<(), String>;
    fn value(&self) -> String;
    fn as_any(&self) -> &dyn Any;
}

/// A shared handle to a cell, held by both a registry and (optionally) the
/// caller that declared the field. Parsing is single-threaded, so a plain
/// `Rc<RefCell>` is sufficient.
pub type Binding = Rc<RefCell<ValueCell>>;

/// A typed container for one option's or argument's current value.
///
/// Cells distinguish the seeded default from values written during a parse:
/// `is_set` reports only the latter.
#[derive(Debug)]
pub struct ValueCell {
    kind: ValueKind,
    repeated: bool,
    default: Option<Value>,
    value: Option<Value>,
    set: bool,
    custom: Option<Box<dyn CustomValue>>,
}

impl ValueCell {
    /// Create a scalar cell of the given kind.
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            repeated: false,
            default: None,
            value: None,
            set: false,
            custom: None,
        }
    }

    /// Create a repeated cell: each assignment appends to a list.
    pub fn repeated(kind: ValueKind) -> Self {
        Self {
            repeated: true,
            ..Self::new(kind)
        }
    }

    /// Create a cell wired through a caller-defined parser.
    pub fn custom(parser: Box<dyn CustomValue>) -> Self {
        Self {
            custom: Some(parser),
            ..Self::new(ValueKind::Custom)
        }
    }

    /// Wrap the cell in a shared handle.
    pub fn into_shared(self) -> Binding {
        Rc::new(RefCell::new(self))
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Whether the cell was written during a parse (defaults don't count).
    pub fn is_set(&self) -> bool {
        self.set
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Seed the default, visible to readers until a parse overwrites it.
    pub fn set_default(&mut self, value: Value) {
        self.value = Some(value.clone());
        self.default = Some(value);
    }

    /// Attach a caller-defined parser after construction.
    pub fn attach_custom(&mut self, parser: Box<dyn CustomValue>) {
        self.custom = Some(parser);
    }

    pub fn custom_ref(&self) -> Option<&dyn CustomValue> {
        self.custom.as_deref()
    }

    /// Convert `raw` according to the cell's kind and record it.
    ///
    /// Used by option binding; conversion failures surface immediately.
    pub fn assign(&mut self, raw: &str) -> Result<(), ValueError> {
        let value = self.convert(raw)?;
        self.push(value);
        Ok(())
    }

    /// Record a boolean occurrence (a flag given without a value token).
    pub fn set_bool(&mut self, value: bool) {
        self.push(Value::Bool(value));
    }

    /// Record `raw` without conversion.
    ///
    /// Used by positional binding: storing a raw string is always valid and
    /// coercion happens lazily on read, so malformed input stays legible to
    /// whoever renders it later.
    pub fn store(&mut self, raw: &str) {
        self.push(Value::Str(raw.to_string()));
    }

    fn convert(&mut self, raw: &str) -> Result<Value, ValueError> {
        match self.kind {
            ValueKind::Bool => parse_bool(raw).map(Value::Bool),
            ValueKind::Int => raw
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
            ValueKind::Int64 => raw
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
            ValueKind::Uint => raw
                .parse::<u32>()
                .map(Value::Uint)
                .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
            ValueKind::Uint64 => raw
                .parse::<u64>()
                .map(Value::Uint64)
                .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
            ValueKind::Float64 => raw
                .parse::<f64>()
                .map(Value::Float64)
                .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
            ValueKind::String => Ok(Value::Str(raw.to_string())),
            ValueKind::Duration => humantime::parse_duration(raw)
                .map(Value::Duration)
                .map_err(|_| ValueError::InvalidDuration(raw.to_string())),
            ValueKind::Custom => {
                let parser = self
                    .custom
                    .as_mut()
                    .ok_or_else(|| ValueError::Custom("no custom parser attached".to_string()))?;
                parser.set(raw).map_err(ValueError::Custom)?;
                Ok(Value::Str(raw.to_string()))
            }
        }
    }

    fn push(&mut self, value: Value) {
        if self.repeated {
            // The first parsed occurrence replaces the seeded default list.
            match &mut self.value {
                Some(Value::List(items)) if self.set => items.push(value),
                _ => self.value = Some(Value::List(vec![value])),
            }
        } else {
            self.value = Some(value);
        }
        self.set = true;
    }

    /// String form of the current value, as handed to validators.
    pub fn display(&self) -> String {
        if self.kind == ValueKind::Custom {
            if let Some(parser) = &self.custom {
                return parser.value();
            }
        }
        match &self.value {
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }

    pub fn bool_or(&self, fallback: bool) -> bool {
        match &self.value {
            Some(Value::Bool(b)) => *b,
            Some(Value::Str(s)) => parse_bool(s).unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn int_or(&self, fallback: i32) -> i32 {
        match &self.value {
            Some(Value::Int(n)) => *n,
            Some(Value::Str(s)) => s.parse().unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn int64_or(&self, fallback: i64) -> i64 {
        match &self.value {
            Some(Value::Int64(n)) => *n,
            Some(Value::Int(n)) => i64::from(*n),
            Some(Value::Str(s)) => s.parse().unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn uint_or(&self, fallback: u32) -> u32 {
        match &self.value {
            Some(Value::Uint(n)) => *n,
            Some(Value::Str(s)) => s.parse().unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn uint64_or(&self, fallback: u64) -> u64 {
        match &self.value {
            Some(Value::Uint64(n)) => *n,
            Some(Value::Uint(n)) => u64::from(*n),
            Some(Value::Str(s)) => s.parse().unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn float_or(&self, fallback: f64) -> f64 {
        match &self.value {
            Some(Value::Float64(n)) => *n,
            Some(Value::Str(s)) => s.parse().unwrap_or(fallback),
            _ => fallback,
        }
    }

    pub fn str_or(&self, fallback: &str) -> String {
        match &self.value {
            Some(v) => v.to_string(),
            None => fallback.to_string(),
        }
    }

    pub fn duration_or(&self, fallback: Duration) -> Duration {
        match &self.value {
            Some(Value::Duration(d)) => *d,
            Some(Value::Str(s)) => humantime::parse_duration(s).unwrap_or(fallback),
            _ => fallback,
        }
    }

    /// All recorded values in string form; a scalar cell yields at most one.
    pub fn strings(&self) -> Vec<String> {
        match &self.value {
            Some(Value::List(items)) => items.iter().map(|v| v.to_string()).collect(),
            Some(v) => vec![v.to_string()],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_spellings() {
        for raw in ["1", "on", "yes", "true", "TRUE", "Yes"] {
            assert!(parse_bool(raw).unwrap(), "expected '{}' to be true", raw);
        }
        for raw in ["0", "off", "no", "false", "FALSE", "No"] {
            assert!(!parse_bool(raw).unwrap(), "expected '{}' to be false", raw);
        }
        assert!(matches!(parse_bool("maybe"), Err(ValueError::InvalidBool(_))));
    }

    #[test]
    fn test_scalar_assign_overwrites() {
        let mut cell = ValueCell::new(ValueKind::String);
        cell.assign("first").unwrap();
        cell.assign("second").unwrap();
        assert_eq!(cell.str_or(""), "second");
    }

    #[test]
    fn test_repeated_assign_appends() {
        let mut cell = ValueCell::repeated(ValueKind::String);
        cell.assign("tom").unwrap();
        cell.assign("john").unwrap();
        assert_eq!(cell.strings(), vec!["tom", "john"]);
    }

    #[test]
    fn test_repeated_first_assign_replaces_default() {
        let mut cell = ValueCell::repeated(ValueKind::String);
        cell.set_default(Value::List(vec![Value::Str("seed".to_string())]));
        assert_eq!(cell.strings(), vec!["seed"]);
        cell.assign("fresh").unwrap();
        assert_eq!(cell.strings(), vec!["fresh"]);
    }

    #[test]
    fn test_default_visible_until_set() {
        let mut cell = ValueCell::new(ValueKind::Int);
        cell.set_default(Value::Int(8080));
        assert!(!cell.is_set());
        assert_eq!(cell.int_or(0), 8080);
        cell.assign("9000").unwrap();
        assert!(cell.is_set());
        assert_eq!(cell.int_or(0), 9000);
    }

    #[test]
    fn test_assign_reports_bad_numbers() {
        let mut cell = ValueCell::new(ValueKind::Int);
        assert!(matches!(
            cell.assign("twelve"),
            Err(ValueError::InvalidNumber(_))
        ));
        let mut cell = ValueCell::new(ValueKind::Uint64);
        assert!(matches!(cell.assign("-3"), Err(ValueError::InvalidNumber(_))));
    }

    #[test]
    fn test_duration_assign_and_read() {
        let mut cell = ValueCell::new(ValueKind::Duration);
        cell.assign("2s").unwrap();
        assert_eq!(cell.duration_or(Duration::ZERO), Duration::from_secs(2));
        assert!(matches!(
            cell.assign("fast"),
            Err(ValueError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_raw_store_reads_lazily() {
        let mut cell = ValueCell::new(ValueKind::String);
        cell.store("42");
        assert_eq!(cell.int_or(0), 42);
        cell.store("not-a-number");
        assert_eq!(cell.int_or(7), 7);
        assert_eq!(cell.str_or(""), "not-a-number");
    }

    #[test]
    fn test_reads_are_idempotent() {
        let mut cell = ValueCell::new(ValueKind::Int64);
        cell.assign("99").unwrap();
        assert_eq!(cell.int64_or(0), 99);
        assert_eq!(cell.int64_or(0), 99);
        assert_eq!(cell.display(), "99");
    }

    #[derive(Debug, Default)]
    struct Verbosity {
        level: u8,
    }

    impl CustomValue for Verbosity {
        fn set(&mut self, raw: &str) -> Result<(), String> {
            self.level = match raw {
                "quiet" => 0,
                "normal" => 1,
                "debug" => 2,
                other => return Err(format!("unknown verbosity: {}", other)),
            };
            Ok(())
        }

        fn value(&self) -> String {
            self.level.to_string()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_custom_cell_delegates() {
        let mut cell = ValueCell::custom(Box::new(Verbosity::default()));
        cell.assign("debug").unwrap();
        assert_eq!(cell.display(), "2");
        let parsed = cell
            .custom_ref()
            .unwrap()
            .as_any()
            .downcast_ref::<Verbosity>()
            .unwrap();
        assert_eq!(parsed.level, 2);
        assert!(matches!(cell.assign("loud"), Err(ValueError::Custom(_))));
    }

    #[test]
    fn test_custom_cell_without_parser_errors() {
        let mut cell = ValueCell::new(ValueKind::Custom);
        assert!(matches!(cell.assign("x"), Err(ValueError::Custom(_))));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Float64(1.5).to_string(), "1.5");
        assert_eq!(
            Value::List(vec![Value::Str("a".to_string()), Value::Str("b".to_string())])
                .to_string(),
            "a,b"
        );
        assert_eq!(Value::Duration(Duration::from_secs(90)).to_string(), "1m 30s");
    }
}
