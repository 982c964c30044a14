//! Ensembler outputs to a typed Arrow column.

use std::sync::Arc;

use arrow::array::{ArrayBuilder, ArrayRef, Float64Builder, Int64Builder, ListBuilder, StringBuilder};
use datafusion_common::{DataFusionError, Result};
use ensembler_plugin_common::{ResultType, Value};

/// Builders that accept ensembler values of one element kind.
trait ElementBuilder: ArrayBuilder {
    /// Append `value`, returning false when its kind doesn't fit.
    fn append_element(&mut self, value: &Value) -> bool;
}

impl ElementBuilder for Float64Builder {
    fn append_element(&mut self, value: &Value) -> bool {
        match value {
            Value::Null => self.append_null(),
            Value::Float(v) => self.append_value(*v),
            Value::Int(v) => self.append_value(*v as f64),
            _ => return false,
        }
        true
    }
}

impl ElementBuilder for Int64Builder {
    fn append_element(&mut self, value: &Value) -> bool {
        match value {
            Value::Null => self.append_null(),
            Value::Int(v) => self.append_value(*v),
            _ => return false,
        }
        true
    }
}

impl ElementBuilder for StringBuilder {
    fn append_element(&mut self, value: &Value) -> bool {
        match value {
            Value::Null => self.append_null(),
            Value::String(v) => self.append_value(v),
            _ => return false,
        }
        true
    }
}

/// Build the UDF output column for `values`, one per input row.
///
/// Integers are accepted for floating result types; any other mismatch
/// between a value and `result_type` fails naming the offending row.
pub fn build_result_array(result_type: &ResultType, values: &[Value]) -> Result<ArrayRef> {
    let capacity = values.len();
    match (result_type, result_type.element_type()) {
        (ResultType::Primitive(_), element) if element.is_floating() => {
            build_scalars(Float64Builder::with_capacity(capacity), result_type, values)
        }
        (ResultType::Primitive(_), element) if element.is_integral() => {
            build_scalars(Int64Builder::with_capacity(capacity), result_type, values)
        }
        (ResultType::Primitive(_), _) => {
            build_scalars(StringBuilder::with_capacity(capacity, capacity * 8), result_type, values)
        }
        (ResultType::Array(_), element) if element.is_floating() => {
            build_lists(Float64Builder::new(), result_type, values)
        }
        (ResultType::Array(_), element) if element.is_integral() => {
            build_lists(Int64Builder::new(), result_type, values)
        }
        (ResultType::Array(_), _) => {
            build_lists(StringBuilder::new(), result_type, values)
        }
    }
}

fn build_scalars<B: ElementBuilder>(
    mut builder: B,
    result_type: &ResultType,
    values: &[Value],
) -> Result<ArrayRef> {
    for (row, value) in values.iter().enumerate() {
        if !builder.append_element(value) {
            return Err(mismatch(row, result_type, value));
        }
    }
    Ok(builder.finish())
}

fn build_lists<B: ElementBuilder>(
    items: B,
    result_type: &ResultType,
    values: &[Value],
) -> Result<ArrayRef> {
    let mut builder = ListBuilder::with_capacity(items, values.len());
    for (row, value) in values.iter().enumerate() {
        match value {
            Value::Null => builder.append_null(),
            Value::List(elements) => {
                for element in elements {
                    if !builder.values().append_element(element) {
                        return Err(mismatch(row, result_type, element));
                    }
                }
                builder.append(true);
            }
            other => return Err(mismatch(row, result_type, other)),
        }
    }
    Ok(Arc::new(builder.finish()))
}

fn mismatch(row: usize, result_type: &ResultType, value: &Value) -> DataFusionError {
    DataFusionError::Execution(format!(
        "Ensembler result for row {row} does not match declared type {result_type}: got {kind}",
        kind = value.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};
    use ensembler_plugin_common::PrimitiveType;

    #[test]
    fn test_double_accepts_integers() {
        let array = build_result_array(
            &ResultType::Primitive(PrimitiveType::Double),
            &[Value::Int(1), Value::Float(2.5), Value::Null],
        )
        .unwrap();
        let floats = array.as_primitive::<Float64Type>();
        assert_eq!(floats.value(0), 1.0);
        assert_eq!(floats.value(1), 2.5);
        assert!(floats.is_null(2));
    }

    #[test]
    fn test_integer_rejects_floats_naming_row() {
        let err = build_result_array(
            &ResultType::Primitive(PrimitiveType::Integer),
            &[Value::Int(1), Value::Float(2.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"), "{err}");
    }

    #[test]
    fn test_array_of_long() {
        let array = build_result_array(
            &ResultType::Array(PrimitiveType::Long),
            &[Value::from(vec![1i64, 2]), Value::Null],
        )
        .unwrap();
        let lists = array.as_list::<i32>();
        assert_eq!(lists.len(), 2);
        assert!(lists.is_null(1));
        let first = lists.value(0);
        assert_eq!(first.as_primitive::<Int64Type>().values().to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_array_rejects_scalar() {
        assert!(build_result_array(
            &ResultType::Array(PrimitiveType::String),
            &[Value::from("x")]
        )
        .is_err());
    }
}
