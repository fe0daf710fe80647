mod classifier;
mod model;
mod page;
mod results;
mod routes;
mod server;
mod session;
mod speech;
mod telemetry;
mod upload;

pub mod app;
pub mod config;

pub use app::start_app;
