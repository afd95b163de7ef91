//! Natural-language sentence for a medication's dosage instructions.
//!
//! Only the first instruction is read; further regimens are ignored.

use serde_json::Value;

use crate::extract::{concept_text, first_element, format_numeric, str_at, value_at};

pub const NO_INSTRUCTIONS: &str = "No dosage instructions available.";
pub const NO_SPECIFIC_INSTRUCTIONS: &str = "No specific dosage instructions available.";
pub const TAKE_AS_NEEDED: &str = "Take as needed.";

/// Build the sentence for a `dosage` / `dosageInstruction` array.
pub fn synthesize(instructions: &[Value]) -> String {
    let Some(first) = instructions.first() else {
        return NO_INSTRUCTIONS.to_string();
    };

    if first.get("asNeededBoolean").and_then(Value::as_bool) == Some(true) {
        return match str_at(first, &["text"]).map(|text| strip_periods(&text).to_string()) {
            Some(text) if !text.is_empty() => format!("{text}."),
            _ => TAKE_AS_NEEDED.to_string(),
        };
    }

    let clauses: Vec<String> = [instruction_clause(first), quantity_clause(first)]
        .into_iter()
        .flatten()
        .collect();

    if clauses.is_empty() {
        NO_SPECIFIC_INSTRUCTIONS.to_string()
    } else {
        format!("{}.", clauses.join(". "))
    }
}

/// Free text wins over coded additional instructions.
fn instruction_clause(dosage: &Value) -> Option<String> {
    let text = str_at(dosage, &["text"]).or_else(|| {
        let parts: Vec<String> = dosage
            .get("additionalInstruction")
            .and_then(Value::as_array)?
            .iter()
            .filter_map(concept_text)
            .map(|part| strip_periods(&part).to_string())
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    })?;

    let text = strip_periods(&text);
    (!text.is_empty()).then(|| text.to_string())
}

fn quantity_clause(dosage: &Value) -> Option<String> {
    let dose = first_element(dosage, "doseAndRate")
        .and_then(|rate| value_at(rate, &["doseQuantity", "value"]))
        .and_then(Value::as_f64)?;

    let quantity = format!("Quantity of {}", format_numeric(dose));
    match value_at(dosage, &["timing", "repeat"]).and_then(frequency_phrase) {
        Some(phrase) => Some(format!("{quantity}, {phrase}")),
        None => Some(quantity),
    }
}

fn frequency_phrase(repeat: &Value) -> Option<String> {
    let unit = str_at(repeat, &["periodUnit"])?;
    // `2` and `2.0` are the same frequency.
    let frequency = format_numeric(repeat.get("frequency").and_then(Value::as_f64).unwrap_or(1.0));
    let period = repeat.get("period").and_then(Value::as_f64).unwrap_or(1.0);

    if period == 1.0 && unit == "d" {
        match frequency.as_str() {
            "1" => return Some("once per day".to_string()),
            "2" => return Some("twice per day".to_string()),
            "3" => return Some("three times per day".to_string()),
            _ => {}
        }
    }

    let times = match frequency.as_str() {
        "1" => "once".to_string(),
        "2" => "twice".to_string(),
        n => format!("{n} times"),
    };
    Some(format!("{times} per {} {unit}", format_numeric(period)))
}

fn strip_periods(text: &str) -> &str {
    text.trim().trim_end_matches('.').trim_end()
}
