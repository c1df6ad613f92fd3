pub mod app;
pub mod db;
pub mod files;
pub mod models;
pub mod ratelimit;
pub mod sheets;
pub mod storage;
pub mod validate;
