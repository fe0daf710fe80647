mod data_uri;
mod gemini_service;
mod inference_service;
mod model_service;
mod prompts;
mod server;

pub mod config;

pub use server::start_server;
