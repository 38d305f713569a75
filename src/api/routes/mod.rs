pub mod health;
pub mod models_status;
pub mod runs;
