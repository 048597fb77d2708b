//! Coach-authored workout templates: TOML format, parsing, and storage.

pub mod parser;
pub mod service;
pub mod toml_format;

pub use parser::{TemplateDraft, TemplateParseError, into_draft, parse_template_toml};
pub use service::{
    TemplateDetail, create_template, delete_template, get_template_detail, list_templates,
    render_template_toml,
};
pub use toml_format::{BlockToml, ExerciseToml, TemplateMeta, TemplateToml};
