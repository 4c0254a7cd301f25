//! Terminal driver: stdin commands in, transcript text out.
mod app;
mod clipboard;
mod commands;
mod config;
mod effects;
mod logging;
mod view;

pub use app::run_app;
