//! Application layer: the transfer engine, its caller-side service, and the
//! sliding-window throttle.
//!
//! Everything here is written against the ports in `domain::ports`; none of it
//! knows which storage backend is plugged in.

pub mod engine;
pub mod exchange;
pub mod service;
pub mod throttle;
