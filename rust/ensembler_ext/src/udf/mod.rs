mod ensemble;
mod layout;
pub mod result_builder;
pub mod row_decoder;

pub use ensemble::EnsembleUdf;
pub use layout::RowLayout;
