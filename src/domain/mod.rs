//! Domain types and the ports the application layer is written against.

pub mod account;
pub mod ports;
pub mod throttle;
pub mod transfer;
