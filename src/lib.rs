pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod inspector;
pub mod pipeline;
