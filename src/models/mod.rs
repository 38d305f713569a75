pub mod finding;
pub mod run;
pub mod task;

pub use finding::{Finding, Severity};
pub use run::{ProjectReport, Run, RunReport};
pub use task::{Task, TaskKind, TaskStatus};
