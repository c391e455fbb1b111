pub mod app;
pub mod cache;
pub mod commands;
pub mod comments;
pub mod config;
pub mod event;
pub mod feed;
pub mod hn;
pub mod live;
