pub extern crate actix_web;

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod room;
pub mod server;
pub mod socket;
pub mod square_store;
pub mod storage;
