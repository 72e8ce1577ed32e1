pub mod atomic_sequence;
pub mod chat;
pub mod commandline;
pub mod configuration;
pub mod context;
pub mod error;
pub mod feed;
pub mod forum;
pub mod gateway;
pub mod image;
pub mod profile;
pub mod proxy;
pub mod session;
pub mod tutor;
pub mod types;
pub mod utils;
