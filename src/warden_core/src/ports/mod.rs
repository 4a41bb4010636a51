pub mod handler;
pub mod populator;
