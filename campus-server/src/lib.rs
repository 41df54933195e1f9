pub mod api;
pub mod app;
pub mod auth;
pub mod database;
pub mod jobs;
pub mod mask;
pub mod repository;
pub mod shortid;
pub mod storage;
