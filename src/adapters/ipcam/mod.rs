pub mod http_camera;
