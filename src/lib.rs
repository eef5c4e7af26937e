pub mod app;
pub mod config;
pub mod input;
pub mod lyrics;
pub mod player;
pub mod queue;
pub mod sources;
pub mod storage;
