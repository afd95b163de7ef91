//! Typed accessors over untyped FHIR JSON.

use serde_json::Value;

/// Follow a chain of object keys.
pub(crate) fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Non-blank string at `path`, trimmed.
pub(crate) fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    value_at(value, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// First non-blank string among several candidate paths.
pub(crate) fn first_str_at(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| str_at(value, path))
}

pub(crate) fn first_element<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.get(field)?.as_array()?.first()
}

fn primary_coding(concept: &Value) -> Option<&Value> {
    first_element(concept, "coding")
}

/// Display of the first coding that has one, else the concept's free text.
pub(crate) fn coded_name(concept: Option<&Value>) -> Option<String> {
    let concept = concept?;
    concept
        .get("coding")
        .and_then(Value::as_array)
        .and_then(|codings| codings.iter().find_map(|coding| str_at(coding, &["display"])))
        .or_else(|| str_at(concept, &["text"]))
}

/// `(code, system)` of the first coding.
pub(crate) fn code_and_system(concept: Option<&Value>) -> (Option<String>, Option<String>) {
    match concept.and_then(primary_coding) {
        Some(coding) => (str_at(coding, &["code"]), str_at(coding, &["system"])),
        None => (None, None),
    }
}

/// Status-like field: a plain code string, or the first coding code of a concept.
pub(crate) fn status_code(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if let Some(text) = value.as_str() {
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }

    value
        .get("coding")
        .and_then(Value::as_array)
        .and_then(|codings| codings.iter().find_map(|coding| str_at(coding, &["code"])))
        .or_else(|| str_at(value, &["text"]))
}

/// Display text of a concept: free text first, then any coding display.
pub(crate) fn concept_text(concept: &Value) -> Option<String> {
    str_at(concept, &["text"]).or_else(|| {
        concept
            .get("coding")
            .and_then(Value::as_array)
            .and_then(|codings| codings.iter().find_map(|coding| str_at(coding, &["display"])))
    })
}

pub(crate) fn format_numeric(value: f64) -> String {
    if (value.fract() - 0.0).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
