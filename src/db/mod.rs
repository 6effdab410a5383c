pub mod connection;
pub mod query;

pub use connection::{ConnectionPool, Connector};
pub use query::{fetch, fetch_one, QueryExecutor};
