pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod listing;
pub mod log;
pub mod matching;
pub mod output;
pub mod prepare;
pub mod publication;
pub mod resource;
pub mod spatial;
pub mod udata;
