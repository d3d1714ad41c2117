//! # Metadata Subcommands
//!
//! `show`, `get` and `set` over a build's documents. `get` is a soft probe:
//! a missing field prints `null` and exits 0. `set` merges into `meta.json`
//! and flushes atomically.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use cosa_build::{Build, Document, DocumentKey};

/// Arguments for `cosa-meta show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Document to print: commit, config, image or meta.
    #[arg(long, default_value = "meta")]
    pub key: String,
}

/// Arguments for `cosa-meta get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Document to look in: commit, config, image or meta.
    pub document: String,
    /// Top-level field.
    pub field: String,
    /// Optional field nested under `field`.
    pub subfield: Option<String>,
}

/// Arguments for `cosa-meta set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Assignments to merge into meta.json. Values are parsed as JSON,
    /// falling back to a plain string.
    #[arg(value_name = "FIELD=VALUE", required = true)]
    pub assignments: Vec<String>,
}

/// Print a whole document.
pub fn run_show(args: &ShowArgs, build: &mut Build, out: &mut dyn Write) -> Result<u8> {
    let doc = build.get(&args.key)?;
    writeln!(out, "{}", serde_json::to_string_pretty(doc)?)?;
    Ok(0)
}

/// Print a single field, or `null` if absent.
pub fn run_get(args: &GetArgs, build: &mut Build, out: &mut dyn Write) -> Result<u8> {
    let key: DocumentKey = args.document.parse()?;
    let value = match &args.subfield {
        Some(sub) => build.get_nested(key, &args.field, sub),
        None => build.get_field(key, &args.field),
    };
    let rendered = match value {
        Some(v) => serde_json::to_string_pretty(v)?,
        None => "null".to_string(),
    };
    writeln!(out, "{rendered}")?;
    Ok(0)
}

/// Merge assignments into meta.json and persist.
pub fn run_set(args: &SetArgs, build: &mut Build, out: &mut dyn Write) -> Result<u8> {
    let mut updates = Document::new();
    for assignment in &args.assignments {
        let (field, value) = parse_assignment(assignment)?;
        updates.insert(field, value);
    }
    let count = updates.len();
    build.merge(updates)?;
    build
        .flush()
        .with_context(|| format!("failed to write meta.json for build {}", build.id()))?;
    writeln!(out, "OK: updated {count} field(s) in build {}", build.id())?;
    Ok(0)
}

/// Split `field=value`, parsing the value as JSON when possible.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let Some((field, raw)) = assignment.split_once('=') else {
        bail!("expected FIELD=VALUE, got {assignment:?}");
    };
    if field.is_empty() {
        bail!("empty field name in {assignment:?}");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assignment_parses_json_values() {
        assert_eq!(parse_assignment("a=1").unwrap(), ("a".to_string(), json!(1)));
        assert_eq!(parse_assignment("a=true").unwrap(), ("a".to_string(), json!(true)));
        assert_eq!(
            parse_assignment(r#"a={"b":[1]}"#).unwrap(),
            ("a".to_string(), json!({"b": [1]}))
        );
    }

    #[test]
    fn assignment_falls_back_to_string() {
        assert_eq!(
            parse_assignment("summary=Fedora CoreOS").unwrap(),
            ("summary".to_string(), json!("Fedora CoreOS"))
        );
        assert_eq!(parse_assignment("x=a=b").unwrap(), ("x".to_string(), json!("a=b")));
        assert_eq!(parse_assignment("x=").unwrap(), ("x".to_string(), json!("")));
    }

    #[test]
    fn assignment_rejects_malformed_input() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }
}
