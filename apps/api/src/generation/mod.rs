//! Email generation: customer retrieval, the streaming producer and its HTTP handlers.

pub mod handlers;
pub mod producer;
pub mod retrieval;
