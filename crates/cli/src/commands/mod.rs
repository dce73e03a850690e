pub mod backends;
pub mod config_cmd;
pub mod context;
pub mod import;
pub mod models;
