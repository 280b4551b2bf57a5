//! LLM prompts for the extraction pipeline.
//!
//! Templates are plain constants with `{placeholder}` markers filled by the
//! `format_*` functions, so the exact text sent to the model is easy to
//! inspect in tests and logs.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::block::TextBlock;
use crate::types::record::BusinessContextRecord;

/// Prompt for extracting a candidate record from anchored text blocks.
pub const EXTRACT_PROMPT: &str = r#"You are an expert information extractor. From the text blocks below, fill in the business context schema.

Rules:
1. Use ONLY the given text. Do not invent or infer values that cannot be traced to a block.
2. For each field, give an evidence pointer: the block locator in brackets (for example "brief.txt | line 3"), or a short note explaining why the field is missing or ambiguous.
3. Leave a field null (or an empty list) when the text does not support it.

Schema:
{schema}

Source metadata:
{metadata}

Text blocks:
{blocks}

Output a single JSON object with the schema fields. Each field may be a plain value or {"value": ..., "evidence": "..."}. Put notes on missing or ambiguous fields in a top-level "notes" object keyed by field name."#;

/// Prompt for repairing a candidate that failed schema coercion.
pub const REPAIR_PROMPT: &str = r#"You are a JSON repair agent. The JSON below does not conform to the schema. Repair it so it matches the schema exactly.

If you cannot confidently repair a field, leave it null or empty and explain why in a top-level "notes" object keyed by field name. Do not add fields that are not in the schema.

Schema (JSON Schema):
{schema}

Invalid JSON:
{candidate}

Validation error:
{error}

Return only the repaired JSON object."#;

/// Prompt for enriching missing or ambiguous fields from public knowledge.
pub const ENRICH_PROMPT: &str = r#"You are a research agent. Enrich the business context record below using only publicly available information.

Rules:
1. Only fill fields that are missing or ambiguous: {missing}
2. Keep every populated field exactly as it is.
3. For each field you enrich, add an entry to a top-level "sources" object (field name -> URL or citation).
4. If no reliable public source exists for a field, leave it empty and add an entry to a top-level "notes" object explaining why.
5. Do not fabricate information.

Field guidance:
{guidance}

Record:
{record}

Return only the enriched JSON object."#;

/// Meaning of each schema field, given to the enrichment model.
pub const FIELD_GUIDANCE: [(&str, &str); 9] = [
    ("client_name", "Legal or commonly used name of the client organisation."),
    ("industry", "Primary industry or sector the client operates in."),
    ("location", "Headquarters city and country, or main operating region."),
    ("engagement_age", "Duration of the engagement with the client, in whole years."),
    ("business_overview", "Two or three sentences on what the client does and its current situation."),
    ("objectives", "Goals the client wants to reach with this engagement, most important first."),
    ("company_info", "Facts about the company such as size, founding year, ownership or structure."),
    ("additional_context_questions", "Questions to ask the client to close gaps in the material."),
    ("potential_future_opportunities", "Follow-on work that could grow out of the engagement."),
];

/// Short hash of all templates, logged with each run to tie output to prompt text.
pub fn prompt_version() -> String {
    let mut hasher = Sha256::new();
    hasher.update(EXTRACT_PROMPT.as_bytes());
    hasher.update(REPAIR_PROMPT.as_bytes());
    hasher.update(ENRICH_PROMPT.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

/// Render blocks as `[source | anchor] text`.
///
/// With a `max_chars` cap, trailing blocks that do not fit are left out
/// (the first block always stays). Returns the rendered text and the
/// number of blocks left out.
pub fn format_blocks(blocks: &[TextBlock], max_chars: Option<usize>) -> (String, usize) {
    let mut rendered = String::new();
    let mut included = 0;

    for block in blocks {
        let line = format!("[{}] {}\n", block.locator(), block.text);
        let over = max_chars.is_some_and(|max| rendered.len() + line.len() > max);
        if over && !rendered.is_empty() {
            break;
        }
        rendered.push_str(&line);
        included += 1;
    }

    let omitted = blocks.len() - included;
    if omitted > 0 {
        rendered.push_str(&format!(
            "[{omitted} further blocks omitted to fit the prompt budget]\n"
        ));
    }
    (rendered, omitted)
}

/// Format the extraction prompt.
pub fn format_extract_prompt(schema: &str, metadata: &Value, blocks: &str) -> String {
    EXTRACT_PROMPT
        .replace("{schema}", schema)
        .replace("{metadata}", &pretty(metadata))
        .replace("{blocks}", blocks)
}

/// Format the repair prompt.
pub fn format_repair_prompt(candidate: &Value, error: &str) -> String {
    REPAIR_PROMPT
        .replace("{schema}", &pretty(&BusinessContextRecord::json_schema()))
        .replace("{candidate}", &pretty(candidate))
        .replace("{error}", error)
}

/// Format the enrichment prompt.
pub fn format_enrich_prompt(record: &BusinessContextRecord) -> String {
    let missing = record.missing_fields();
    let missing = if missing.is_empty() {
        "none are empty; only correct values that are clearly ambiguous".to_string()
    } else {
        missing.join(", ")
    };

    let guidance = FIELD_GUIDANCE
        .iter()
        .map(|(field, meaning)| format!("- {field}: {meaning}"))
        .collect::<Vec<_>>()
        .join("\n");

    let record_json = serde_json::to_value(record).unwrap_or(Value::Null);

    ENRICH_PROMPT
        .replace("{missing}", &missing)
        .replace("{guidance}", &guidance)
        .replace("{record}", &pretty(&record_json))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
