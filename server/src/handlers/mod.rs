//! Request handlers.

pub mod items;
