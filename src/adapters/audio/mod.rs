pub mod piper;
