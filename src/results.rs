//! Materialized query results.
//!
//! Every engine buffers the first result set of a command into a [`ResultSet`];
//! a [`DataReader`] walks it with a forward-only cursor.

mod reader;
mod result_set;
mod row;

pub use reader::DataReader;
pub use result_set::ResultSet;
pub use row::CustomDbRow;
