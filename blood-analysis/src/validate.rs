//! Recovers the analysis JSON from a model's free-form answer and checks it
//! against the result schema.
//!
//! The payload is the span from the first `{` to the last `}`; prose around it
//! is dropped. Unknown keys are ignored, and a `metadata` object sent by the
//! model is discarded since metadata is always attached locally.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::{
    AnalysisDraft, BloodMarker, HealthSummary, MarkerStatus, MarkerValue, Recommendations,
};

type Result<T> = std::result::Result<T, ValidationError>;

const ROOT: &str = "$";

/// Brace-delimited span of `text`, greedy from the first `{` to the last `}`.
pub fn extract_json_payload(text: &str) -> Result<&str> {
    let start = text.find('{').ok_or(ValidationError::NoJsonFound)?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or(ValidationError::NoJsonFound)?;
    Ok(&text[start..=end])
}

/// Locate, parse and validate the result embedded in `text`.
pub fn validate_response(text: &str) -> Result<AnalysisDraft> {
    let payload = extract_json_payload(text)?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    validate(&value)
}

/// Check an already parsed payload field by field.
pub fn validate(payload: &Value) -> Result<AnalysisDraft> {
    let root = as_object(payload, ROOT)?;

    let markers = as_array(required(root, "", "markers")?, "markers")?
        .iter()
        .enumerate()
        .map(|(i, item)| marker(item, &format!("markers[{}]", i)))
        .collect::<Result<Vec<_>>>()?;

    let summary_obj = as_object(required(root, "", "summary")?, "summary")?;
    let summary = HealthSummary {
        overall_health: string_field(summary_obj, "summary", "overallHealth")?,
        key_findings: string_list_field(summary_obj, "summary", "keyFindings")?,
        risk_factors: string_list_field(summary_obj, "summary", "riskFactors")?,
    };

    let recs_obj = as_object(required(root, "", "recommendations")?, "recommendations")?;
    let recommendations = Recommendations {
        diet: string_list_field(recs_obj, "recommendations", "diet")?,
        lifestyle: string_list_field(recs_obj, "recommendations", "lifestyle")?,
        follow_up: string_list_field(recs_obj, "recommendations", "followUp")?,
    };

    Ok(AnalysisDraft {
        markers,
        summary,
        recommendations,
    })
}

fn marker(value: &Value, path: &str) -> Result<BloodMarker> {
    let obj = as_object(value, path)?;

    let value_path = join(path, "value");
    let marker_value = match required(obj, path, "value")? {
        Value::Number(n) => n
            .as_f64()
            .map(MarkerValue::Number)
            .ok_or_else(|| ValidationError::schema(&value_path, "number out of range"))?,
        Value::String(s) => MarkerValue::Text(s.clone()),
        other => {
            return Err(ValidationError::schema(
                value_path,
                format!("expected number or string, got {}", kind(other)),
            ));
        }
    };

    let status = match optional(obj, "status") {
        None => None,
        Some(Value::String(s)) => Some(
            s.parse::<MarkerStatus>()
                .map_err(|e| ValidationError::schema(join(path, "status"), e))?,
        ),
        Some(other) => {
            return Err(ValidationError::schema(
                join(path, "status"),
                format!("expected string, got {}", kind(other)),
            ));
        }
    };

    let confidence = match optional(obj, "confidence") {
        None => None,
        Some(v) => {
            let n = v.as_f64().ok_or_else(|| {
                ValidationError::schema(
                    join(path, "confidence"),
                    format!("expected number, got {}", kind(v)),
                )
            })?;
            if !(0.0..=1.0).contains(&n) {
                return Err(ValidationError::schema(
                    join(path, "confidence"),
                    format!("expected a value between 0 and 1, got {}", n),
                ));
            }
            Some(n)
        }
    };

    Ok(BloodMarker {
        name: string_field(obj, path, "name")?,
        value: marker_value,
        unit: string_field(obj, path, "unit")?,
        ref_range: string_field(obj, path, "refRange")?,
        status,
        confidence,
    })
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required<'a>(obj: &'a Map<String, Value>, parent: &str, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| ValidationError::schema(join(parent, key), "required field is missing"))
}

/// Absent keys are fine; an explicit `null` is still checked and rejected.
fn optional<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key)
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ValidationError::schema(path, format!("expected object, got {}", kind(value)))
    })
}

fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| {
        ValidationError::schema(path, format!("expected array, got {}", kind(value)))
    })
}

fn string_field(obj: &Map<String, Value>, parent: &str, key: &str) -> Result<String> {
    let path = join(parent, key);
    match required(obj, parent, key)? {
        Value::String(s) => Ok(s.clone()),
        other => Err(ValidationError::schema(
            path,
            format!("expected string, got {}", kind(other)),
        )),
    }
}

fn string_list_field(obj: &Map<String, Value>, parent: &str, key: &str) -> Result<Vec<String>> {
    let path = join(parent, key);
    as_array(required(obj, parent, key)?, &path)?
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(ValidationError::schema(
                format!("{}[{}]", path, i),
                format!("expected string, got {}", kind(other)),
            )),
        })
        .collect()
}
