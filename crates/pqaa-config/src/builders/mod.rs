mod config;

pub use config::ConfigBuilder;
