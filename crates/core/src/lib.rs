pub mod config;
pub mod data_engine;
pub mod decoder;
pub mod fetch_runner;
pub mod fields;
pub mod loaded_window;
pub mod normalizer;
pub mod query_planner;
pub mod row;
pub mod view_reducer;
pub mod view_state;
