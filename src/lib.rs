pub mod alerts;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod history;
pub mod ingest;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;
pub mod weather;

#[cfg(test)]
pub mod test_support;
