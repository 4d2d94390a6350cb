//! Parsing and schema checks for model-produced extraction payloads.

use serde_json::{Map, Value};

use crate::error::AttemptError;
use crate::types::StructuredForecast;

const REQUIRED_FIELDS: [&str; 3] = ["specific_regions", "other_regions", "max_temp"];

/// Turn raw model text into a JSON object, tolerating markdown fences.
pub fn parse_model_json(raw: &str) -> Result<Value, AttemptError> {
    let cleaned = ai_client::strip_code_blocks(raw);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| AttemptError::MalformedOutput {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(AttemptError::MalformedOutput {
            raw: raw.to_string(),
            reason: "top-level JSON value is not an object".to_string(),
        });
    }
    Ok(value)
}

/// Check a candidate against the extraction contract and convert it.
///
/// The three top-level fields must be present. Every `geo` must be a list of
/// strings; every temperature must be a number or null (a missing key counts
/// as null). `other_regions` and `max_temp` may themselves be null.
pub fn validate_extracted_info(value: &Value) -> Result<StructuredForecast, AttemptError> {
    check_shape(value).map_err(|reason| AttemptError::SchemaInvalid {
        payload: value.clone(),
        reason,
    })?;

    let mut forecast: StructuredForecast =
        serde_json::from_value(value.clone()).map_err(|e| AttemptError::SchemaInvalid {
            payload: value.clone(),
            reason: e.to_string(),
        })?;

    // Canonical names are the standardizer's job, whatever the model sent.
    for region in &mut forecast.specific_regions {
        region.std_geo.clear();
    }
    if let Some(ref mut max_temp) = forecast.max_temp {
        max_temp.std_geo.clear();
    }

    Ok(forecast)
}

fn check_shape(value: &Value) -> Result<(), String> {
    let root = value.as_object().ok_or("payload is not an object")?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !root.contains_key(**f)) {
        return Err(format!("missing field `{missing}`"));
    }

    let regions = root["specific_regions"]
        .as_array()
        .ok_or("`specific_regions` is not a list")?;
    for (idx, region) in regions.iter().enumerate() {
        let region = region
            .as_object()
            .ok_or_else(|| format!("specific_regions[{idx}] is not an object"))?;
        check_geo(region, &format!("specific_regions[{idx}]"))?;
        check_number(region, "tmax_min", &format!("specific_regions[{idx}]"))?;
        check_number(region, "tmax_max", &format!("specific_regions[{idx}]"))?;
    }

    match &root["other_regions"] {
        Value::Null => {}
        Value::Object(other) => {
            check_number(other, "tmax_min", "other_regions")?;
            check_number(other, "tmax_max", "other_regions")?;
        }
        _ => return Err("`other_regions` is neither null nor an object".to_string()),
    }

    match &root["max_temp"] {
        Value::Null => {}
        Value::Object(max_temp) => {
            check_geo(max_temp, "max_temp")?;
            check_number(max_temp, "tmax", "max_temp")?;
        }
        _ => return Err("`max_temp` is neither null nor an object".to_string()),
    }

    Ok(())
}

fn check_geo(entity: &Map<String, Value>, path: &str) -> Result<(), String> {
    let geo = entity
        .get("geo")
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{path}.geo is missing or not a list"))?;
    if geo.iter().any(|g| !g.is_string()) {
        return Err(format!("{path}.geo contains a non-string entry"));
    }
    Ok(())
}

fn check_number(entity: &Map<String, Value>, key: &str, path: &str) -> Result<(), String> {
    match entity.get(key) {
        None | Some(Value::Null) | Some(Value::Number(_)) => Ok(()),
        Some(other) => Err(format!("{path}.{key} is not a number: {other}")),
    }
}
