//! Coercion of untyped candidates into [`BusinessContextRecord`].
//!
//! Accepted shapes, per field:
//!
//! - plain values: `"industry": "Retail"`
//! - wrappers: `"industry": {"value": "Retail", "evidence": "brief.txt | line 4"}`
//!
//! and, at the top level, `evidence`, `notes` and `sources` side tables.
//! Side tables are collected beside the record, never copied into it. Any
//! other key is rejected so that nothing outside the schema can slip past
//! validation.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::CoercionError;
use crate::types::record::{BusinessContextRecord, CandidateRecord};

const LIST_OF_STRINGS: &str = "a list of strings";
const TEXT: &str = "a string";
const WHOLE_NUMBER: &str = "a non-negative whole number";

/// Keys allowed inside a per-field wrapper object.
const WRAPPER_KEYS: [&str; 6] = ["value", "evidence", "note", "notes", "source", "sources"];

/// A record that passed coercion, with the side tables found around it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coerced {
    pub record: BusinessContextRecord,
    /// Evidence pointer (anchor or note) per field
    pub evidence: BTreeMap<String, Value>,
    /// Why a field is missing or ambiguous
    pub notes: BTreeMap<String, String>,
    /// Public source per enriched field
    pub sources: BTreeMap<String, Value>,
}

/// Coerce a candidate map into the schema.
pub fn coerce_candidate(candidate: &CandidateRecord) -> Result<Coerced, CoercionError> {
    coerce_map(&candidate.0)
}

/// Coerce any JSON value; only objects can succeed.
pub fn coerce_value(value: &Value) -> Result<Coerced, CoercionError> {
    match value {
        Value::Object(map) => coerce_map(map),
        other => Err(CoercionError::NotAnObject {
            found: json_kind(other),
        }),
    }
}

fn coerce_map(map: &Map<String, Value>) -> Result<Coerced, CoercionError> {
    let mut out = Coerced::default();

    for (key, raw) in map {
        match key.as_str() {
            "evidence" => collect_values(key, raw, &mut out.evidence)?,
            "sources" => collect_values(key, raw, &mut out.sources)?,
            "notes" => collect_notes(raw, &mut out.notes)?,
            field if BusinessContextRecord::FIELDS.contains(&field) => {
                let value = unwrap_field(field, raw, &mut out)?;
                set_field(&mut out.record, field, value)?;
            }
            unknown => {
                return Err(CoercionError::UnknownField {
                    field: unknown.to_string(),
                })
            }
        }
    }

    Ok(out)
}

/// Peel a `{"value": .., "evidence": ..}` wrapper, keeping its side values.
fn unwrap_field<'a>(
    field: &str,
    raw: &'a Value,
    out: &mut Coerced,
) -> Result<&'a Value, CoercionError> {
    let Value::Object(wrapper) = raw else {
        return Ok(raw);
    };

    let is_wrapper = wrapper.contains_key("value")
        && wrapper.keys().all(|k| WRAPPER_KEYS.contains(&k.as_str()));
    if !is_wrapper {
        return Err(CoercionError::WrongType {
            field: field.to_string(),
            expected: expected_for(field),
            found: "an object",
        });
    }

    if let Some(evidence) = wrapper.get("evidence").filter(|v| !v.is_null()) {
        out.evidence.insert(field.to_string(), evidence.clone());
    }
    if let Some(note) = wrapper.get("note").or_else(|| wrapper.get("notes")) {
        if let Some(text) = scalar_text(note) {
            out.notes.insert(field.to_string(), text);
        }
    }
    if let Some(source) = wrapper
        .get("source")
        .or_else(|| wrapper.get("sources"))
        .filter(|v| !v.is_null())
    {
        out.sources.insert(field.to_string(), source.clone());
    }

    Ok(&wrapper["value"])
}

fn set_field(
    record: &mut BusinessContextRecord,
    field: &str,
    value: &Value,
) -> Result<(), CoercionError> {
    match field {
        "client_name" => record.client_name = text(field, value)?,
        "industry" => record.industry = text(field, value)?,
        "location" => record.location = text(field, value)?,
        "business_overview" => record.business_overview = text(field, value)?,
        "company_info" => record.company_info = text(field, value)?,
        "engagement_age" => record.engagement_age = whole_number(field, value)?,
        "objectives" => record.objectives = list(field, value)?,
        "additional_context_questions" => record.additional_context_questions = list(field, value)?,
        "potential_future_opportunities" => {
            record.potential_future_opportunities = list(field, value)?
        }
        unknown => {
            return Err(CoercionError::UnknownField {
                field: unknown.to_string(),
            })
        }
    }
    Ok(())
}

fn text(field: &str, value: &Value) -> Result<Option<String>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(wrong_type(field, TEXT, other)),
    }
}

fn list(field: &str, value: &Value) -> Result<Vec<String>, CoercionError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(CoercionError::WrongType {
                    field: field.to_string(),
                    expected: LIST_OF_STRINGS,
                    found: match other {
                        Value::Array(_) => "a list containing a list",
                        _ => "a list containing an object",
                    },
                }),
            })
            .collect(),
        other => Err(wrong_type(field, LIST_OF_STRINGS, other)),
    }
}

fn whole_number(field: &str, value: &Value) -> Result<Option<u32>, CoercionError> {
    let out_of_range = || CoercionError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).map(Some).map_err(|_| out_of_range());
            }
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
                    Ok(Some(f as u32))
                }
                _ => Err(out_of_range()),
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: f64 = trimmed
                .parse()
                .map_err(|_| wrong_type(field, WHOLE_NUMBER, value))?;
            if parsed >= 0.0 && parsed.fract() == 0.0 && parsed <= f64::from(u32::MAX) {
                Ok(Some(parsed as u32))
            } else {
                Err(out_of_range())
            }
        }
        other => Err(wrong_type(field, WHOLE_NUMBER, other)),
    }
}

fn collect_values(
    key: &str,
    raw: &Value,
    into: &mut BTreeMap<String, Value>,
) -> Result<(), CoercionError> {
    match raw {
        Value::Null => Ok(()),
        Value::Object(map) => {
            into.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        }
        other => Err(wrong_type(key, "an object keyed by field", other)),
    }
}

fn collect_notes(raw: &Value, into: &mut BTreeMap<String, String>) -> Result<(), CoercionError> {
    match raw {
        Value::Null => Ok(()),
        Value::String(s) => {
            into.insert("general".to_string(), s.clone());
            Ok(())
        }
        Value::Object(map) => {
            into.extend(
                map.iter()
                    .filter_map(|(k, v)| scalar_text(v).map(|text| (k.clone(), text))),
            );
            Ok(())
        }
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(scalar_text).collect();
            if !joined.is_empty() {
                into.insert("general".to_string(), joined.join("; "));
            }
            Ok(())
        }
        other => Err(wrong_type("notes", "an object keyed by field", other)),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn expected_for(field: &str) -> &'static str {
    match field {
        "engagement_age" => WHOLE_NUMBER,
        "objectives" | "additional_context_questions" | "potential_future_opportunities" => {
            LIST_OF_STRINGS
        }
        _ => TEXT,
    }
}

fn wrong_type(field: &str, expected: &'static str, found: &Value) -> CoercionError {
    CoercionError::WrongType {
        field: field.to_string(),
        expected,
        found: json_kind(found),
    }
}

/// Article-prefixed JSON type name, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
