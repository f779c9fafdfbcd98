pub mod config;
pub mod functions;
pub mod logger;
pub mod macros;
pub mod streams;
