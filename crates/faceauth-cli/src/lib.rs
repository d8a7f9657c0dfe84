pub mod cli;
pub mod commands;
pub mod config;
pub mod enroll;
pub mod errors;
pub mod list;
pub mod login;
pub mod output;
