pub mod connection;
pub mod queue;
pub mod schema;

pub use connection::Database;
pub use queue::{RunStatistics, TaskQueue};
