pub mod api;
pub mod metrics;
pub mod state;
