//! Arrow types for declared ensembler result types.
//!
//! The UDF always produces the widest native type for the element kind
//! (`Int64`, `Float64`, `Utf8`); the declared type may be narrower and is
//! reached with an explicit cast over the UDF output.

use arrow::datatypes::DataType;
use ensembler_plugin_common::{PrimitiveType, ResultType};

pub fn native_element_type(element: PrimitiveType) -> DataType {
    match element {
        PrimitiveType::Double | PrimitiveType::Float => DataType::Float64,
        PrimitiveType::Integer | PrimitiveType::Long => DataType::Int64,
        PrimitiveType::String => DataType::Utf8,
    }
}

pub fn declared_element_type(element: PrimitiveType) -> DataType {
    match element {
        PrimitiveType::Double => DataType::Float64,
        PrimitiveType::Float => DataType::Float32,
        PrimitiveType::Integer => DataType::Int32,
        PrimitiveType::Long => DataType::Int64,
        PrimitiveType::String => DataType::Utf8,
    }
}

/// Type the ensemble UDF returns for `result_type`.
pub fn native_data_type(result_type: &ResultType) -> DataType {
    wrap(result_type, native_element_type(result_type.element_type()))
}

/// Type of the result column after casting.
pub fn declared_data_type(result_type: &ResultType) -> DataType {
    wrap(result_type, declared_element_type(result_type.element_type()))
}

fn wrap(result_type: &ResultType, element: DataType) -> DataType {
    match result_type {
        ResultType::Primitive(_) => element,
        ResultType::Array(_) => DataType::new_list(element, true),
    }
}
