// Domain layer: place model, report types and ports. No backend coupling here.

pub mod model;
pub mod ports;
