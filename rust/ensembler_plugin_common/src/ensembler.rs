use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::input::{Artifacts, EnsembleInput, Headers};
use crate::result_type::ResultType;
use crate::value::Value;

/// Optional entry points an ensembler can advertise.
pub mod caps {
    /// The ensembler wants its artifacts before the first request.
    pub const INITIALIZE: u64 = 1 << 0;
    /// The ensembler accepts request headers alongside its input.
    pub const HEADERS: u64 = 1 << 1;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnsemblerError {
    #[error("ensembler initialization failed: {0}")]
    Initialize(String),
    #[error("invalid ensembler input: {0}")]
    InvalidInput(String),
    #[error("ensembler failed: {0}")]
    Failed(String),
    #[error("ensembler output is not serializable: {0}")]
    Output(String),
}

/// User-supplied combination logic.
///
/// Implementations are shared across worker threads and invoked concurrently,
/// so `ensemble` must not rely on interior state that isn't synchronized.
pub trait Ensembler: Send + Sync {
    /// Bitset of [`caps`] flags.
    fn capabilities(&self) -> u64 {
        0
    }

    /// Output type the ensembler was packaged with, if it declares one.
    fn result_type(&self) -> Option<ResultType> {
        None
    }

    /// Called once per process before any `ensemble` call.
    fn initialize(&self, _artifacts: &Artifacts) -> Result<(), EnsemblerError> {
        Ok(())
    }

    fn ensemble(
        &self,
        input: &EnsembleInput,
        headers: Option<&Headers>,
    ) -> Result<Value, EnsemblerError>;
}

/// Call `ensembler`, forwarding `headers` only when it advertises [`caps::HEADERS`].
///
/// A panic inside the ensembler is caught and returned as
/// [`EnsemblerError::Failed`].
pub fn invoke(
    ensembler: &dyn Ensembler,
    input: &EnsembleInput,
    headers: Option<&Headers>,
) -> Result<Value, EnsemblerError> {
    let headers = if ensembler.capabilities() & caps::HEADERS != 0 {
        headers
    } else {
        None
    };
    panic::catch_unwind(AssertUnwindSafe(|| ensembler.ensemble(input, headers)))
        .unwrap_or_else(|payload| {
            Err(EnsemblerError::Failed(format!(
                "panicked: {}",
                panic_message(payload.as_ref())
            )))
        })
}

/// Text of a panic payload raised with a string message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Adapts a closure into an [`Ensembler`].
pub struct FnEnsembler<F> {
    func: F,
    capabilities: u64,
    result_type: Option<ResultType>,
}

impl<F> FnEnsembler<F>
where
    F: Fn(&EnsembleInput, Option<&Headers>) -> Result<Value, EnsemblerError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            capabilities: 0,
            result_type: None,
        }
    }

    pub fn with_headers(mut self) -> Self {
        self.capabilities |= caps::HEADERS;
        self
    }

    pub fn with_result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = Some(result_type);
        self
    }
}

impl<F> Ensembler for FnEnsembler<F>
where
    F: Fn(&EnsembleInput, Option<&Headers>) -> Result<Value, EnsemblerError> + Send + Sync,
{
    fn capabilities(&self) -> u64 {
        self.capabilities
    }

    fn result_type(&self) -> Option<ResultType> {
        self.result_type
    }

    fn ensemble(
        &self,
        input: &EnsembleInput,
        headers: Option<&Headers>,
    ) -> Result<Value, EnsemblerError> {
        (self.func)(input, headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_count(_: &EnsembleInput, headers: Option<&Headers>) -> Result<Value, EnsemblerError> {
        Ok(Value::Int(headers.map_or(-1, |h| h.len() as i64)))
    }

    #[test]
    fn test_invoke_withholds_headers_without_capability() {
        let mut headers = Headers::new();
        headers.insert("x-request-id".to_string(), "abc".to_string());
        let input = EnsembleInput::default();

        let legacy = FnEnsembler::new(header_count);
        assert_eq!(invoke(&legacy, &input, Some(&headers)).unwrap(), Value::Int(-1));

        let aware = FnEnsembler::new(header_count).with_headers();
        assert_eq!(invoke(&aware, &input, Some(&headers)).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_invoke_turns_panic_into_error() {
        let panicking = FnEnsembler::new(|input: &EnsembleInput, _: Option<&Headers>| {
            if input.features.is_empty() {
                panic!("no features");
            }
            Ok(Value::Null)
        });
        let err = invoke(&panicking, &EnsembleInput::default(), None).unwrap_err();
        assert!(matches!(&err, EnsemblerError::Failed(msg) if msg.contains("no features")), "{err}");
    }

    #[test]
    fn test_panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(format!("index {}", 3));
        assert_eq!(panic_message(owned.as_ref()), "index 3");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
