//! Custom field definition rules: modules, field types, name derivation,
//! and option-list validation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("valid regex"));

/// Business module that custom fields and chain rules are scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Leads,
    Accounts,
}

impl Module {
    pub const ALL: [Module; 2] = [Module::Leads, Module::Accounts];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Leads => "leads",
            Module::Accounts => "accounts",
        }
    }

    /// Parse a module name as stored in the database or sent by clients.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "leads" => Ok(Module::Leads),
            "accounts" => Ok(Module::Accounts),
            other => Err(CoreError::Validation(format!(
                "Invalid module '{other}'. Must be one of: leads, accounts"
            ))),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input widget / storage type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Date,
    Boolean,
    Select,
    Radio,
    Multiselect,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Textarea => "TEXTAREA",
            FieldType::Number => "NUMBER",
            FieldType::Date => "DATE",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Select => "SELECT",
            FieldType::Radio => "RADIO",
            FieldType::Multiselect => "MULTISELECT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "TEXT" => Ok(FieldType::Text),
            "TEXTAREA" => Ok(FieldType::Textarea),
            "NUMBER" => Ok(FieldType::Number),
            "DATE" => Ok(FieldType::Date),
            "BOOLEAN" => Ok(FieldType::Boolean),
            "SELECT" => Ok(FieldType::Select),
            "RADIO" => Ok(FieldType::Radio),
            "MULTISELECT" => Ok(FieldType::Multiselect),
            other => Err(CoreError::Validation(format!(
                "Invalid field_type '{other}'"
            ))),
        }
    }

    /// Choice types carry an option list; all others must not.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::Multiselect
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the machine name of a field from its human label.
///
/// Lowercases, turns whitespace runs into a single `_`, and strips every
/// character outside `[a-z0-9_]`. The result may be empty; callers go
/// through [`field_name_from_label`] to reject that.
pub fn derive_field_name(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let underscored = WHITESPACE_RE.replace_all(&lowered, "_");
    NON_WORD_RE.replace_all(&underscored, "").into_owned()
}

/// Derive a field name and fail when nothing usable is left.
pub fn field_name_from_label(label: &str) -> Result<String, CoreError> {
    if label.trim().is_empty() {
        return Err(CoreError::Validation("field_label is required".into()));
    }
    let name = derive_field_name(label);
    if name.is_empty() {
        return Err(CoreError::Validation(format!(
            "field_label '{label}' does not produce a valid field name"
        )));
    }
    Ok(name)
}

/// Check the option list against the field type and return it normalized.
///
/// Choice types need at least one non-blank option; other types must not
/// send any. Options are trimmed and keep their order.
pub fn validate_options(
    field_type: FieldType,
    options: Option<&[String]>,
) -> Result<Option<Vec<String>>, CoreError> {
    if !field_type.has_options() {
        return match options {
            Some(opts) if !opts.is_empty() => Err(CoreError::Validation(format!(
                "options are not allowed for field_type {field_type}"
            ))),
            _ => Ok(None),
        };
    }

    let opts = options.unwrap_or_default();
    if opts.is_empty() {
        return Err(CoreError::Validation(format!(
            "options are required for field_type {field_type}"
        )));
    }

    let mut normalized = Vec::with_capacity(opts.len());
    for opt in opts {
        let trimmed = opt.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "options must not contain blank entries".into(),
            ));
        }
        normalized.push(trimmed.to_string());
    }
    Ok(Some(normalized))
}
