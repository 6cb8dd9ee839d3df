pub mod audio;
pub mod http;
pub mod ipcam;
pub mod onnx;
pub mod pipeline;
pub mod sources;
pub mod v4l2;
