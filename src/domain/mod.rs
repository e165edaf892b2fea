// Domain layer: core models and ports (interfaces) for the data store, the email API and timing.

pub mod model;
pub mod ports;
