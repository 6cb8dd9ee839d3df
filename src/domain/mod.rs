pub mod activity;
pub mod alerts;
pub mod background;
pub mod camera;
pub mod clock;
pub mod config;
pub mod detection;
pub mod errors;
pub mod model;
pub mod motion;
pub mod smoother;
pub mod stream;
