// Domain layer: value types and ports (interfaces) for the external collaborators.

pub mod model;
pub mod period;
pub mod ports;
