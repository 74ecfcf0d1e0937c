use serde::Deserialize;
use serde_json::Value;

use ci_types::ObservationCategory;

/// What kind of work a batch represents, inferred by a short LLM prompt
/// over the user prompt, tool sequence, and touched files. Carries no
/// behavior of its own; the processor stores it for later reporting.
pub use ci_types::BatchClassification;

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    observations: Vec<RawObservation>,
    #[serde(default)]
    summary: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(rename = "type", default)]
    category: Option<String>,
    observation: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedObservation {
    pub category: ObservationCategory,
    pub text: String,
    pub context: Option<String>,
    pub importance: Option<u8>,
    pub tags: Vec<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub observations: Vec<ExtractedObservation>,
    pub summary: Option<String>,
}

/// Parses an LLM completion that is supposed to be `{ observations: [...],
/// summary }` but may be wrapped in reasoning tokens, a markdown fence, or
/// extra prose around the JSON object. Returns an empty result rather than
/// an error on total garbage, since a missed extraction is far less costly
/// than a processor tick that hard-fails on a flaky model response.
pub fn parse_extraction(raw_response: &str) -> ExtractionResult {
    let stripped = strip_reasoning_blocks(raw_response);
    let Some(json_text) = extract_json_object(&stripped) else {
        return ExtractionResult::default();
    };

    let Ok(parsed) = serde_json::from_str::<RawExtraction>(&json_text) else {
        return ExtractionResult::default();
    };

    let observations = parsed
        .observations
        .into_iter()
        .map(|raw| ExtractedObservation {
            category: category_from_str(raw.category.as_deref().unwrap_or("other")),
            text: raw.observation,
            context: raw.context,
            importance: raw.importance.map(|v| v.clamp(1, 10) as u8),
            tags: raw.tags,
            file_path: raw.file_path,
        })
        .collect();

    ExtractionResult { observations, summary: parsed.summary.as_ref().map(normalize_summary) }
}

/// An LLM asked for a single summary string sometimes answers with a JSON
/// array of sentence fragments instead of prose; join them with spaces.
pub fn normalize_summary(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

/// Stable string key for an observation's category, used as one field of
/// the content hash that makes re-extraction idempotent.
pub fn category_key(category: &ObservationCategory) -> String {
    match category {
        ObservationCategory::Decision => "decision".to_string(),
        ObservationCategory::Convention => "convention".to_string(),
        ObservationCategory::Gotcha => "gotcha".to_string(),
        ObservationCategory::Preference => "preference".to_string(),
        ObservationCategory::Todo => "todo".to_string(),
        ObservationCategory::Other(s) => format!("other:{s}"),
    }
}

pub fn category_from_str(s: &str) -> ObservationCategory {
    match s.trim().to_ascii_lowercase().as_str() {
        "decision" => ObservationCategory::Decision,
        "convention" => ObservationCategory::Convention,
        "gotcha" => ObservationCategory::Gotcha,
        "preference" => ObservationCategory::Preference,
        "todo" => ObservationCategory::Todo,
        other => ObservationCategory::Other(other.to_string()),
    }
}

const REASONING_TAGS: &[(&str, &str)] = &[("<think>", "</think>"), ("<reasoning>", "</reasoning>"), ("<thinking>", "</thinking>")];

fn strip_reasoning_blocks(text: &str) -> String {
    let mut result = text.to_string();
    for (open, close) in REASONING_TAGS {
        while let Some(start) = result.find(open) {
            if let Some(end) = result[start..].find(close) {
                result.replace_range(start..start + end + close.len(), "");
            } else {
                result.replace_range(start.., "");
                break;
            }
        }
    }
    result
}

/// Finds a JSON object to parse: prefers a ```json fenced block, then
/// falls back to the first balanced `{…}` span in the text.
fn extract_json_object(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let after = &text[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim().to_string());
        }
    }

    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_object() {
        let raw = r#"{"observations":[{"type":"decision","observation":"use sqlite"}],"summary":"set up storage"}"#;
        let result = parse_extraction(raw);
        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.observations[0].text, "use sqlite");
        assert_eq!(result.summary.as_deref(), Some("set up storage"));
    }

    #[test]
    fn strips_think_blocks_and_fence() {
        let raw = "<think>let me consider this</think>\n```json\n{\"observations\":[],\"summary\":\"done\"}\n```";
        let result = parse_extraction(raw);
        assert_eq!(result.summary.as_deref(), Some("done"));
    }

    #[test]
    fn normalizes_list_summary_by_joining_with_spaces() {
        let raw = r#"{"observations":[],"summary":["added","login","form"]}"#;
        let result = parse_extraction(raw);
        assert_eq!(result.summary.as_deref(), Some("added login form"));
    }

    #[test]
    fn garbage_input_yields_empty_result_not_an_error() {
        let result = parse_extraction("the model refused to answer");
        assert!(result.observations.is_empty());
        assert!(result.summary.is_none());
    }

    #[test]
    fn clamps_out_of_range_importance() {
        let raw = r#"{"observations":[{"type":"gotcha","observation":"x","importance":99}],"summary":null}"#;
        let result = parse_extraction(raw);
        assert_eq!(result.observations[0].importance, Some(10));
    }

    #[test]
    fn classification_round_trips_through_parse() {
        assert_eq!(BatchClassification::parse("Implementation"), Some(BatchClassification::Implementation));
        assert_eq!(BatchClassification::parse("unknown"), None);
    }
}
