//! Parameter tensors and their conversion to nested JSON arrays.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{NetBundleError, Result};

/// What to do with NaN or infinite values when encoding a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Fail the run with a serialization error.
    #[default]
    Reject,
    /// Write `0.0` in place of the offending value.
    Zero,
}

/// A materialized value as returned by an evaluation context.
///
/// `name` is present when the source exposes it alongside the value, which
/// lets extraction match values to declared parameters by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorValue {
    #[serde(default)]
    pub name: Option<String>,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl TensorValue {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            name: None,
            shape,
            data,
        }
    }

    pub fn named(name: impl Into<String>, shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            name: Some(name.into()),
            shape,
            data,
        }
    }
}

/// A named weight matrix or bias vector, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTensor {
    name: String,
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl ParameterTensor {
    /// Create a tensor, checking that `data` fills `shape` exactly.
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let Some(expected) = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) else {
            return Err(NetBundleError::InvalidTensor {
                message: format!("shape {:?} has too many elements", shape),
                name,
            });
        };
        if expected != data.len() {
            return Err(NetBundleError::InvalidTensor {
                message: format!(
                    "shape {:?} needs {} values, got {}",
                    shape,
                    expected,
                    data.len()
                ),
                name,
            });
        }
        Ok(Self { name, shape, data })
    }

    /// Bind a materialized value to a declared parameter name.
    pub fn from_value(name: impl Into<String>, value: TensorValue) -> Result<Self> {
        Self::new(name, value.shape, value.data)
    }

    /// One-dimensional tensor.
    pub fn vector(name: impl Into<String>, data: Vec<f64>) -> Self {
        let len = data.len();
        Self {
            name: name.into(),
            shape: vec![len],
            data,
        }
    }

    /// Two-dimensional tensor from rows. Rows must share a length.
    pub fn matrix(name: impl Into<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let name = name.into();
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().position(|r| r.len() != cols) {
            return Err(NetBundleError::InvalidTensor {
                message: format!("row {} has {} columns, expected {}", row, rows[row].len(), cols),
                name,
            });
        }
        let shape = vec![rows.len(), cols];
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Self::new(name, shape, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Encode as a nested array of plain numbers following the shape.
    ///
    /// 0-d tensors become a bare number, 1-d tensors a flat array.
    pub fn to_json(&self, policy: NonFinitePolicy) -> Result<Value> {
        let mut values = Vec::with_capacity(self.data.len());
        for (index, &v) in self.data.iter().enumerate() {
            values.push(finite_number(&self.name, index, v, policy)?);
        }
        let mut iter = values.into_iter();
        Ok(nest(&self.shape, &mut iter))
    }
}

fn finite_number(name: &str, index: usize, v: f64, policy: NonFinitePolicy) -> Result<Value> {
    let v = if v.is_finite() {
        v
    } else {
        match policy {
            NonFinitePolicy::Reject => {
                return Err(NetBundleError::Serialization {
                    key: name.to_string(),
                    message: format!("non-finite value {} at flat index {}", v, index),
                })
            }
            NonFinitePolicy::Zero => 0.0,
        }
    };
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| NetBundleError::Serialization {
            key: name.to_string(),
            message: format!("value {} at flat index {} is not representable", v, index),
        })
}

fn nest(shape: &[usize], values: &mut impl Iterator<Item = Value>) -> Value {
    match shape.split_first() {
        None => values.next().unwrap_or(Value::Null),
        Some((&len, [])) => Value::Array(values.take(len).collect()),
        Some((&len, rest)) => Value::Array((0..len).map(|_| nest(rest, values)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_must_match_data() {
        let err = ParameterTensor::new("W0", vec![2, 3], vec![1.0; 5]).unwrap_err();
        assert!(matches!(err, NetBundleError::InvalidTensor { .. }));
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let err = ParameterTensor::new("W", vec![usize::MAX / 2 + 1, 2], vec![]).unwrap_err();
        match err {
            NetBundleError::InvalidTensor { name, message } => {
                assert_eq!(name, "W");
                assert!(message.contains("too many elements"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let value = TensorValue::new(vec![usize::MAX, usize::MAX, 0], vec![]);
        assert!(ParameterTensor::from_value("W", value).is_err());
    }

    #[test]
    fn test_zero_length_dimensions() {
        let rows = ParameterTensor::new("W", vec![3, 0], vec![]).unwrap();
        assert_eq!(rows.to_json(NonFinitePolicy::Reject).unwrap(), json!([[], [], []]));

        let empty = ParameterTensor::new("W", vec![0, 4], vec![]).unwrap();
        assert_eq!(empty.to_json(NonFinitePolicy::Reject).unwrap(), json!([]));

        let err = ParameterTensor::new("W", vec![3, 0], vec![1.0]).unwrap_err();
        assert!(matches!(err, NetBundleError::InvalidTensor { .. }));
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let err = ParameterTensor::matrix("W0", vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        match err {
            NetBundleError::InvalidTensor { message, .. } => assert!(message.contains("row 1")),
            other => panic!("unexpected error: {other:?}"),
        }
        let empty = ParameterTensor::matrix("W0", vec![]).unwrap();
        assert_eq!(empty.shape(), &[0, 0]);
    }

    #[test]
    fn test_matrix_keeps_rows_and_columns() {
        let t = ParameterTensor::matrix("W0", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(
            t.to_json(NonFinitePolicy::Reject).unwrap(),
            json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
        );
    }

    #[test]
    fn test_vector_is_flat() {
        let t = ParameterTensor::vector("b0", vec![0.5, -0.25]);
        assert_eq!(t.to_json(NonFinitePolicy::Reject).unwrap(), json!([0.5, -0.25]));
    }

    #[test]
    fn test_scalar_and_three_dimensional() {
        let scalar = ParameterTensor::new("s", vec![], vec![3.0]).unwrap();
        assert_eq!(scalar.to_json(NonFinitePolicy::Reject).unwrap(), json!(3.0));

        let cube = ParameterTensor::new("c", vec![2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            cube.to_json(NonFinitePolicy::Reject).unwrap(),
            json!([[[1.0, 2.0]], [[3.0, 4.0]]])
        );
    }

    #[test]
    fn test_non_finite_rejected_by_default() {
        let t = ParameterTensor::vector("b1", vec![1.0, f64::NAN]);
        let err = t.to_json(NonFinitePolicy::default()).unwrap_err();
        match err {
            NetBundleError::Serialization { key, message } => {
                assert_eq!(key, "b1");
                assert!(message.contains("flat index 1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_zeroed_when_requested() {
        let t = ParameterTensor::vector("b1", vec![f64::INFINITY, 2.0]);
        assert_eq!(t.to_json(NonFinitePolicy::Zero).unwrap(), json!([0.0, 2.0]));
    }
}
