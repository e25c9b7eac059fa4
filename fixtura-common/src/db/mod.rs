//! Database access: connection factory, managed schema, reset

pub mod init;
pub mod reset;
pub mod schema_sync;
pub mod table_schemas;

pub use init::*;
pub use reset::*;
pub use schema_sync::*;
pub use table_schemas::*;
