//! Cell addressing and value types

mod address;
mod value;

pub use address::{split_sheet_prefix, CellAddress, CellRange, CellRangeIterator};
pub use value::CellValue;
