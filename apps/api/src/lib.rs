pub mod client;
pub mod config;
pub mod demo;
pub mod errors;
pub mod feedback;
pub mod generation;
pub mod llm_client;
pub mod models;
pub mod routes;
pub mod state;
pub mod stream;

#[cfg(test)]
mod testing;
