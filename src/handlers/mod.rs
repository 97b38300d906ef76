pub mod assets;
pub mod config;
pub mod gateway;
pub mod relay;
