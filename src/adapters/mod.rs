pub mod csv_adapter;
pub mod cache_adapter;
pub mod file_config_adapter;
