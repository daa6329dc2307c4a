//! Schema model - the in-memory description of expected database structure.
//!
//! A [`SchemaModel`] holds tables, indexes, and foreign keys. Models are
//! compared structurally by the differ and serialized by the snapshot codec.

mod column;
mod index;
mod schema;
mod table;

pub use column::{ColumnDef, ColumnType, DefaultValue};
pub use index::{ForeignKeyDef, IndexDef, ReferentialAction};
pub use schema::SchemaModel;
pub use table::TableDef;
