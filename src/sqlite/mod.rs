// SQLite module - embedded database files via rusqlite
//
// This module is split into several sub-modules:
// - connection: the DbConnection implementation over the blocking pool
// - params: named parameter conversion and binding
// - query: result extraction and building
// - kit: the SqliteKit capability object
// - client: the SqliteDbClient administrative client

pub mod client;
pub mod connection;
pub mod kit;
pub mod params;
pub mod query;

pub use client::SqliteDbClient;
pub use connection::SqliteConnection;
pub use kit::SqliteKit;
pub use query::build_result_set;
