pub mod alerts;
pub mod config;
pub mod consumer;
pub mod emitter;
pub mod error;
pub mod feed;
pub mod mailbox;
pub mod model;
pub mod pipeline;
pub mod scheduler;
pub mod sources;
