//! JSON-safe serialization of analytics payloads.

use serde::Serialize;
use serde_json::Value;

/// `Some(value)` when finite, otherwise `None`.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Round to `places` decimals, keeping non-finite input as `None`.
pub fn round_to(value: f64, places: i32) -> Option<f64> {
    let factor = 10f64.powi(places);
    finite((value * factor).round() / factor)
}

/// Serialize `payload` into a [`Value`] in which no NaN or infinity survives.
///
/// `serde_json` already maps non-finite floats to `null` when building a
/// `Value`; the walk below also catches numbers smuggled in as pre-built
/// `Value`s.
pub fn sanitize_json<T: Serialize>(payload: &T) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(payload)?;
    scrub(&mut value);
    Ok(value)
}

fn scrub(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if number.as_f64().is_some_and(|f| !f.is_finite()) {
                *value = Value::Null;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(scrub),
        Value::Object(map) => map.values_mut().for_each(scrub),
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Payload {
        mean: f64,
        spread: Vec<f64>,
        nested: BTreeMap<String, Option<f64>>,
    }

    #[test]
    fn test_non_finite_values_become_null_everywhere() {
        let payload = Payload {
            mean: f64::NAN,
            spread: vec![1.0, f64::INFINITY, f64::NEG_INFINITY],
            nested: BTreeMap::from([("r".to_string(), Some(f64::NAN)), ("s".to_string(), Some(0.5))]),
        };

        let value = sanitize_json(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "mean": null,
                "spread": [1.0, null, null],
                "nested": {"r": null, "s": 0.5}
            })
        );
        assert!(!serde_json::to_string(&value).unwrap().contains("NaN"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.345_678, 2), Some(2.35));
        assert_eq!(round_to(f64::NAN, 2), None);
        assert_eq!(finite(f64::INFINITY), None);
    }
}
