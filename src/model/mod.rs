//! Data model shared by every pipeline stage.

pub mod table;
pub mod value;

pub use table::{RawTable, Records, Row, Table};
pub use value::{ColumnType, RawValue, Value};
