// Domain layer: feed and Discord payload models plus the ports the relay depends on.

pub mod model;
pub mod ports;
