pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod cross_project;
pub mod errors;
pub mod failover;
pub mod history;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod prioritize;
pub mod report;
pub mod runner;
pub mod schedule;
pub mod store;
