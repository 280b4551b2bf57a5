//! Record types flowing between pipeline stages.
//!
//! - [`CandidateRecord`] - untyped, schema-shaped model output (no guarantees)
//! - [`BusinessContextRecord`] - the one authoritative schema
//! - [`SentinelFailure`] / [`Outcome`] - failures carried forward as data

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder for narrative fields when the input had no text at all.
pub const NO_CONTENT: &str = "No content";

/// Structured description of a client engagement.
///
/// This is the single shape every stage must eventually produce. All
/// fields are optional; list fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BusinessContextRecord {
    /// Name of the client organisation
    #[serde(default)]
    pub client_name: Option<String>,

    /// Industry or sector the client operates in
    #[serde(default)]
    pub industry: Option<String>,

    /// Headquarters or main operating location
    #[serde(default)]
    pub location: Option<String>,

    /// Duration of the engagement, in whole years
    #[serde(default)]
    pub engagement_age: Option<u32>,

    /// Short narrative of the client's business and situation
    #[serde(default)]
    pub business_overview: Option<String>,

    /// Goals the client wants to reach, most important first
    #[serde(default)]
    pub objectives: Vec<String>,

    /// Facts about the company (size, history, structure)
    #[serde(default)]
    pub company_info: Option<String>,

    /// Questions to ask the client to close gaps in the material
    #[serde(default)]
    pub additional_context_questions: Vec<String>,

    /// Follow-on work that could come out of the engagement
    #[serde(default)]
    pub potential_future_opportunities: Vec<String>,
}

impl BusinessContextRecord {
    /// Names of every schema field, in declaration order.
    pub const FIELDS: [&'static str; 9] = [
        "client_name",
        "industry",
        "location",
        "engagement_age",
        "business_overview",
        "objectives",
        "company_info",
        "additional_context_questions",
        "potential_future_opportunities",
    ];

    /// Narrative fields that take the [`NO_CONTENT`] placeholder.
    pub const NARRATIVE_FIELDS: [&'static str; 2] = ["business_overview", "company_info"];

    /// Record for an input that contained no text.
    pub fn no_content() -> Self {
        Self {
            business_overview: Some(NO_CONTENT.to_string()),
            company_info: Some(NO_CONTENT.to_string()),
            ..Default::default()
        }
    }

    /// True when the record has nothing that identifies the client.
    pub fn lacks_identifying_data(&self) -> bool {
        let blank = |v: &Option<String>| {
            v.as_deref()
                .map(|s| s.trim().is_empty() || s == NO_CONTENT)
                .unwrap_or(true)
        };
        blank(&self.client_name)
            && blank(&self.industry)
            && blank(&self.location)
            && blank(&self.business_overview)
            && blank(&self.company_info)
    }

    /// Fields that are null or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let mut check = |name: &'static str, empty: bool| {
            if empty {
                missing.push(name);
            }
        };
        check("client_name", self.client_name.is_none());
        check("industry", self.industry.is_none());
        check("location", self.location.is_none());
        check("engagement_age", self.engagement_age.is_none());
        check("business_overview", self.business_overview.is_none());
        check("objectives", self.objectives.is_empty());
        check("company_info", self.company_info.is_none());
        check(
            "additional_context_questions",
            self.additional_context_questions.is_empty(),
        );
        check(
            "potential_future_opportunities",
            self.potential_future_opportunities.is_empty(),
        );
        missing
    }

    /// Formal JSON Schema, generated from the type.
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(BusinessContextRecord);
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}

/// Untyped, schema-shaped output of extraction or repair.
///
/// Values may be wrapped as `{"value": .., "evidence": ..}` and the map may
/// carry `evidence`, `notes` or `sources` side tables. Nothing is checked
/// until validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateRecord(pub Map<String, Value>);

impl CandidateRecord {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Candidate equivalent to an empty input.
    pub fn no_content() -> Self {
        match serde_json::to_value(BusinessContextRecord::no_content()) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

impl From<BusinessContextRecord> for CandidateRecord {
    fn from(record: BusinessContextRecord) -> Self {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

/// A stage failure kept as inspectable data.
///
/// Serializes as `{"error": .., "raw_response": ..}`, the same shape
/// whether it came from extraction, repair or enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelFailure {
    pub error: String,
    pub raw_response: String,
}

impl SentinelFailure {
    pub fn new(error: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            raw_response: raw_response.into(),
        }
    }

    /// JSON shape of the sentinel, as a candidate would see it.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "error": self.error,
            "raw_response": self.raw_response,
        })
    }
}

/// Result of a stage: a value or a sentinel failure.
///
/// Every stage accepts and returns this, so each one is a total function
/// over both variants rather than relying on errors crossing stage
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Ok(T),
    Failed(SentinelFailure),
}

impl<T> Outcome<T> {
    pub fn failed(error: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self::Failed(SentinelFailure::new(error, raw_response))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn as_ok(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SentinelFailure> {
        match self {
            Self::Ok(_) => None,
            Self::Failed(f) => Some(f),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Failed(s) => Outcome::Failed(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_all_fields() {
        let json = serde_json::to_value(BusinessContextRecord::default()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        for field in BusinessContextRecord::FIELDS {
            assert!(keys.contains(&field), "missing {field}");
        }
        assert_eq!(keys.len(), BusinessContextRecord::FIELDS.len());
    }

    #[test]
    fn test_no_content_record() {
        let record = BusinessContextRecord::no_content();
        assert_eq!(record.business_overview.as_deref(), Some(NO_CONTENT));
        assert_eq!(record.company_info.as_deref(), Some(NO_CONTENT));
        assert!(record.objectives.is_empty());
        assert!(record.lacks_identifying_data());
    }

    #[test]
    fn test_sentinel_shape() {
        let outcome: Outcome<CandidateRecord> = Outcome::failed("no JSON", "just prose");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"error": "no JSON", "raw_response": "just prose"}));
    }

    #[test]
    fn test_json_schema_lists_fields() {
        let schema = BusinessContextRecord::json_schema();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("objectives"));
        assert!(props.contains_key("engagement_age"));
        assert_eq!(props.len(), 9);
    }

    #[test]
    fn test_missing_fields() {
        let record = BusinessContextRecord {
            client_name: Some("ACME".to_string()),
            objectives: vec!["Grow".to_string()],
            ..Default::default()
        };
        let missing = record.missing_fields();
        assert!(!missing.contains(&"client_name"));
        assert!(!missing.contains(&"objectives"));
        assert!(missing.contains(&"industry"));
    }
}
