//! The route manager and its dedicated routing worker thread

mod manager;
mod worker;

pub use manager::{RouteManager, RoutingError};
