pub mod config;
pub mod errors;
pub mod guid;
pub mod kernel;
