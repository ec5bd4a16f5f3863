//! Harvest Nike missile site records from the Wikipedia list page and keep
//! them in one of several interchangeable stores.

pub mod config;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod service;
pub mod store;
