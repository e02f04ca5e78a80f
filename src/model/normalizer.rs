//! Feature Normalizer
//!
//! Applies the training scaler `(x - mean) / scale` in canonical feature order.

use serde_json::{Map, Value};
use thiserror::Error;

use super::params::ModelParams;

/// Raw flow: feature name -> value, as received on the wire
pub type Flow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Non-numeric or non-finite feature: {0}")]
    InvalidFeature(String),

    #[error("Feature values overflow the model")]
    NumericOverflow,
}

/// Read a feature value. Numeric strings are accepted, everything else must be a JSON number.
pub fn feature_value(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    raw.is_finite().then_some(raw)
}

/// Normalize a flow into the model's feature vector
pub fn normalize(flow: &Flow, params: &ModelParams) -> Result<Vec<f64>, FlowError> {
    params
        .features
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = flow
                .get(name)
                .ok_or_else(|| FlowError::MissingFeature(name.clone()))?;
            let raw = feature_value(value).ok_or_else(|| FlowError::InvalidFeature(name.clone()))?;
            Ok((raw - params.mean[i]) / params.scale[i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ModelParams {
        ModelParams {
            version: "test".to_string(),
            features: vec!["dur".to_string(), "rate".to_string()],
            mean: vec![1.0, 100.0],
            scale: vec![2.0, 50.0],
            weights: vec![1.0, 1.0],
            bias: 0.0,
        }
    }

    fn flow(value: Value) -> Flow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_canonical_order() {
        // Key order in the payload does not matter
        let f = flow(json!({ "rate": 200.0, "dur": 5.0, "extra": "ignored" }));
        let x = normalize(&f, &params()).unwrap();
        assert_eq!(x, vec![2.0, 2.0]);
    }

    #[test]
    fn test_mean_flow_is_zero_vector() {
        let f = flow(json!({ "dur": 1.0, "rate": 100 }));
        let x = normalize(&f, &params()).unwrap();
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_missing_feature() {
        let f = flow(json!({ "dur": 1.0 }));
        assert_eq!(
            normalize(&f, &params()),
            Err(FlowError::MissingFeature("rate".to_string()))
        );
    }

    #[test]
    fn test_invalid_feature_values() {
        for bad in [json!(null), json!(true), json!("abc"), json!(""), json!("NaN"), json!("inf"), json!([1])] {
            let f = flow(json!({ "dur": 1.0, "rate": bad }));
            assert_eq!(
                normalize(&f, &params()),
                Err(FlowError::InvalidFeature("rate".to_string())),
                "value {:?} should be rejected",
                f["rate"]
            );
        }
    }

    #[test]
    fn test_numeric_string_accepted() {
        let f = flow(json!({ "dur": " 3 ", "rate": "2.00E+02" }));
        let x = normalize(&f, &params()).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);
    }
}
