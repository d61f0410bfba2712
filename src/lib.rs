pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod generator;
pub mod introspect;
pub mod llm;
pub mod pipeline;
pub mod segmentation;
pub mod validator;
