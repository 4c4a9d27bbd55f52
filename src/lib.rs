pub mod aggregate;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod submit;
pub mod targets;
