//! Template ID resolution and TOML write-back.
//!
//! - [`resolve_template_id`] accepts either a UUID string or a path to a
//!   template TOML file. If given a file, it reads the `[template].id` field.
//! - [`write_template_id_to_file`] uses `toml_edit` to insert `id = "..."`
//!   into the `[template]` section without disturbing comments or
//!   formatting.

use std::path::Path;

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use coachplan_core::template::TemplateToml;

/// Resolve `input` to a template UUID.
///
/// Strings that end with `.toml`, contain a path separator, or name an
/// existing file are read as template files; anything else must be a UUID.
pub fn resolve_template_id(input: &str) -> Result<Uuid> {
    if looks_like_file_path(input) {
        return read_template_id_from_file(input);
    }
    match Uuid::parse_str(input) {
        Ok(uuid) => Ok(uuid),
        Err(_) if Path::new(input).is_file() => read_template_id_from_file(input),
        Err(e) => Err(e).with_context(|| format!("invalid template ID: {input:?} (not a valid UUID and not a file)")),
    }
}

/// Parse a UUID argument, naming the entity in the error.
pub fn parse_id(entity: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("invalid {entity} ID: {input:?}"))
}

fn looks_like_file_path(input: &str) -> bool {
    input.ends_with(".toml") || input.contains('/')
}

fn read_template_id_from_file(path: &str) -> Result<Uuid> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read template file: {path}"))?;
    let parsed: TemplateToml =
        toml::from_str(&content).with_context(|| format!("failed to parse TOML from {path}"))?;

    match parsed.template.id {
        Some(id) => Ok(id),
        None => bail!(
            "template file {path:?} has no id field in [template] section.\n\
             Run `coachplan template create {path}` first to register it."
        ),
    }
}

/// Insert `id = "<uuid>"` as the first key of the `[template]` section.
pub fn write_template_id_to_file(path: &str, template_id: Uuid) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("failed to parse {path} as TOML document"))?;

    let table = doc
        .get_mut("template")
        .and_then(|v| v.as_table_mut())
        .with_context(|| format!("{path} has no [template] table"))?;

    let entries: Vec<(String, toml_edit::Item)> = table
        .iter()
        .filter(|(k, _)| *k != "id")
        .map(|(k, v)| (k.to_owned(), v.clone()))
        .collect();

    table.clear();
    table.insert("id", toml_edit::value(template_id.to_string()));
    for (key, value) in entries {
        table.insert(&key, value);
    }

    std::fs::write(path, doc.to_string()).with_context(|| format!("failed to write {path}"))?;
    Ok(())
}
