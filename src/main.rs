//! argot - parse an argument vector against a JSON manifest.
//!
//! The binary is a thin presentation layer over the library: it loads a
//! manifest, parses the tokens after the `--` separator, and prints the
//! bound values. Its own command line is parsed with the same engine.

use anyhow::{Context, Result};
use serde_json::Value as Json;

use argot::{Manifest, Outcome, Parser, ValueCell, ValueKind};

/// The tool's own interface, declared the same way target interfaces are.
const CLI_MANIFEST: &str = r#"{
    "name": "argot",
    "description": "Parse an argument vector against a JSON manifest",
    "options": [
        {"name": "config", "shorts": ["c"], "required": true,
         "help": "JSON manifest describing the target interface"},
        {"name": "json", "shorts": ["j"], "type": "bool",
         "help": "Print bound values as a JSON object"}
    ]
}"#;

fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let code = run(&argv)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn run(argv: &[String]) -> Result<i32> {
    let (own, target) = split_at_separator(argv);

    let cli_manifest = Manifest::from_json(CLI_MANIFEST).context("builtin manifest is invalid")?;
    let mut cli = cli_manifest.build().context("builtin manifest is invalid")?;
    match cli.parse(own) {
        Ok(Outcome::Help) => {
            print!("{}", usage_text(&cli_manifest, &cli));
            return Ok(0);
        }
        Ok(Outcome::Parsed { .. }) => {}
        Err(err) => {
            eprintln!("argot: {}", err);
            eprintln!("try 'argot --help'");
            return Ok(2);
        }
    }

    let config = cli.options().value("config").unwrap().str_or("");
    let manifest = Manifest::from_json(&config).context("failed to parse manifest")?;
    let mut parser = manifest.build().context("invalid manifest")?;

    match parser.parse(target) {
        Ok(Outcome::Help) => {
            print!("{}", usage_text(&manifest, &parser));
            Ok(0)
        }
        Ok(Outcome::Parsed { extra }) => {
            if cli.options().value("json").unwrap().bool_or(false) {
                println!("{}", render_json(&parser, &extra)?);
            } else {
                print!("{}", render_plain(&parser, &extra));
            }
            Ok(0)
        }
        Err(err) => {
            let name = manifest.name.as_deref().unwrap_or("script");
            eprintln!("{}: {}", name, err);
            eprintln!("try '{} --help'", name);
            Ok(1)
        }
    }
}

/// Split the vector at the first `--`: everything before belongs to argot,
/// everything after belongs to the target interface.
fn split_at_separator(argv: &[String]) -> (&[String], &[String]) {
    match argv.iter().position(|t| t == "--") {
        Some(at) => (&argv[..at], &argv[at + 1..]),
        None => (argv, &[]),
    }
}

fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Bool => "bool",
        ValueKind::Int => "int",
        ValueKind::Int64 => "int64",
        ValueKind::Uint => "uint",
        ValueKind::Uint64 => "uint64",
        ValueKind::Float64 => "float",
        ValueKind::String => "string",
        ValueKind::Duration => "duration",
        ValueKind::Custom => "value",
    }
}

/// Plain usage listing built from the registries' declaration-order
/// iteration.
fn usage_text(manifest: &Manifest, parser: &Parser) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let name = manifest.name.as_deref().unwrap_or("script");

    if let Some(description) = &manifest.description {
        let _ = writeln!(out, "{}\n", description);
    }
    let _ = write!(out, "Usage: {}", name);
    if !parser.options().is_empty() {
        out.push_str(" [OPTIONS]");
    }
    for arg in parser.arguments().iter() {
        let token = if arg.is_arrayed() {
            format!("{}...", arg.name())
        } else {
            arg.name().to_string()
        };
        if arg.is_required() {
            let _ = write!(out, " <{}>", token);
        } else {
            let _ = write!(out, " [{}]", token);
        }
    }
    out.push('\n');

    if !parser.arguments().is_empty() {
        out.push_str("\nArguments:\n");
        for arg in parser.arguments().iter() {
            let _ = writeln!(out, "  {:<16} {}", arg.name(), arg.help_text());
        }
    }

    out.push_str("\nOptions:\n");
    for spec in parser.options().iter() {
        if spec.is_hidden() {
            continue;
        }
        let mut left = String::new();
        for &short in spec.shorts() {
            let _ = write!(left, "-{}, ", short);
        }
        let _ = write!(left, "--{}", spec.name());
        if spec.kind() != ValueKind::Bool {
            let _ = write!(left, " <{}>", kind_name(spec.kind()));
        }
        let mut right = spec.help_text().to_string();
        if let Some(default) = spec.default() {
            let _ = write!(right, " (default: {})", default);
        }
        if let Some(env) = spec.env_var() {
            let _ = write!(right, " [env: {}]", env);
        }
        if spec.is_required() {
            right.push_str(" (required)");
        }
        let _ = writeln!(out, "  {:<24} {}", left, right.trim());
    }
    let _ = writeln!(out, "  {:<24} Print this help", "-h, --help");
    out
}

fn render_plain(parser: &Parser, extra: &[String]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for spec in parser.options().iter() {
        let cell = parser.options().value(spec.name()).unwrap();
        let _ = writeln!(out, "{}={}", spec.name(), cell.display());
    }
    for spec in parser.arguments().iter() {
        let cell = parser.arguments().value(spec.name()).unwrap();
        let _ = writeln!(out, "{}={}", spec.name(), cell.display());
    }
    if !extra.is_empty() {
        let _ = writeln!(out, "extra={}", extra.join(","));
    }
    out
}

fn render_json(parser: &Parser, extra: &[String]) -> Result<String> {
    let mut options = serde_json::Map::new();
    for spec in parser.options().iter() {
        let cell = parser.options().value(spec.name()).unwrap();
        options.insert(spec.name().to_string(), json_value(&cell));
    }
    let mut arguments = serde_json::Map::new();
    for spec in parser.arguments().iter() {
        let cell = parser.arguments().value(spec.name()).unwrap();
        arguments.insert(spec.name().to_string(), json_value(&cell));
    }

    let mut root = serde_json::Map::new();
    root.insert("options".to_string(), Json::Object(options));
    root.insert("arguments".to_string(), Json::Object(arguments));
    root.insert("extra".to_string(), Json::from(extra.to_vec()));
    serde_json::to_string_pretty(&Json::Object(root)).context("failed to serialize values")
}

fn json_value(cell: &ValueCell) -> Json {
    if cell.is_repeated() {
        return Json::from(cell.strings());
    }
    match cell.kind() {
        ValueKind::Bool => Json::Bool(cell.bool_or(false)),
        ValueKind::Int => Json::from(cell.int_or(0)),
        ValueKind::Int64 => Json::from(cell.int64_or(0)),
        ValueKind::Uint => Json::from(cell.uint_or(0)),
        ValueKind::Uint64 => Json::from(cell.uint64_or(0)),
        ValueKind::Float64 => serde_json::Number::from_f64(cell.float_or(0.0))
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueKind::String | ValueKind::Duration | ValueKind::Custom => {
            Json::String(cell.display())
        }
    }
}
