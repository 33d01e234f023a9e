//! Command-line surfaces: process arguments and the interactive console.

pub mod console;
pub mod meteo;
