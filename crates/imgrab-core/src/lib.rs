pub mod config;
pub mod logging;

pub mod agent;
pub mod converter;
pub mod data_url;
pub mod dom;
pub mod host;
pub mod image_ref;
pub mod message;
pub mod observer;
