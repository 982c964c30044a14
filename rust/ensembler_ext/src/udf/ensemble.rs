use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::array::{Array, StructArray};
use arrow::datatypes::DataType;
use datafusion_common::{DataFusionError, Result};
use datafusion_expr::{ColumnarValue, ScalarFunctionArgs, ScalarUDFImpl, Signature, Volatility};
use ensembler_plugin_common::{invoke, Ensembler, ResultType};

use crate::errors::ExtError;
use crate::result_type::native_data_type;
use crate::udf::layout::RowLayout;
use crate::udf::result_builder::build_result_array;
use crate::udf::row_decoder::decode_struct_rows;

/// Scalar UDF applying an ensembler to a struct of every joined column.
///
/// Call it as `ensemble(named_struct('col', col, ...))`. Each struct row is
/// split into features and per-model predictions with [`RowLayout`], passed
/// to the ensembler, and the outputs are collected into the native Arrow
/// type for the declared result type.
pub struct EnsembleUdf {
    name: String,
    signature: Signature,
    ensembler: Arc<dyn Ensembler>,
    layout: Arc<RowLayout>,
    result_type: ResultType,
}

impl EnsembleUdf {
    pub fn new(
        name: impl Into<String>,
        ensembler: Arc<dyn Ensembler>,
        layout: RowLayout,
        result_type: ResultType,
    ) -> Self {
        Self {
            name: name.into(),
            signature: Signature::any(1, Volatility::Volatile),
            ensembler,
            layout: Arc::new(layout),
            result_type,
        }
    }

    pub fn result_type(&self) -> &ResultType {
        &self.result_type
    }
}

impl fmt::Debug for EnsembleUdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnsembleUdf")
            .field("name", &self.name)
            .field("result_type", &self.result_type)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl PartialEq for EnsembleUdf {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.result_type == other.result_type
            && self.layout == other.layout
            && Arc::ptr_eq(&self.ensembler, &other.ensembler)
    }
}

impl Eq for EnsembleUdf {}

impl Hash for EnsembleUdf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.result_type.hash(state);
        self.layout.hash(state);
    }
}

impl ScalarUDFImpl for EnsembleUdf {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        match arg_types {
            [DataType::Struct(_)] => Ok(native_data_type(&self.result_type)),
            _ => Err(DataFusionError::Plan(format!(
                "{} expects a single struct argument, got {arg_types:?}",
                self.name
            ))),
        }
    }

    fn invoke_with_args(&self, args: ScalarFunctionArgs) -> Result<ColumnarValue> {
        let [argument] = args.args.as_slice() else {
            return Err(DataFusionError::Plan(format!(
                "{} expects a single struct argument",
                self.name
            )));
        };
        let array = argument.to_array(args.number_rows)?;
        let rows = array
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| {
                DataFusionError::Plan(format!("{} expects a struct input", self.name))
            })?;

        let decoded = decode_struct_rows(rows)?;
        let mut outputs = Vec::with_capacity(decoded.len());
        for (row, values) in decoded.into_iter().enumerate() {
            let input = self.layout.split(values);
            let output = invoke(self.ensembler.as_ref(), &input, None)
                .map_err(|source| ExtError::Ensembler { row, source })?;
            outputs.push(output);
        }
        Ok(ColumnarValue::Array(build_result_array(
            &self.result_type,
            &outputs,
        )?))
    }
}
