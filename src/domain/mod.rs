// Domain layer: models, ports, and the attribution/sponsorship rules.
// Nothing here talks HTTP directly; adapters implement the ports.

pub mod model;
pub mod ports;

pub mod services;
