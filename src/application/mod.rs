pub mod context;
pub mod dto;
pub mod ports;
pub mod scheduler;
pub mod services;
