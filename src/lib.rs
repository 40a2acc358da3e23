pub mod app;
pub mod common;
pub mod initializers;
pub mod models;
pub mod pipeline;
pub mod workers;
