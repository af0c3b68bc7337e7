pub mod args;
pub mod config;
mod parse;
