pub mod config;
pub mod size;
pub mod upload;
