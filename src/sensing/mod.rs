pub mod camera;
pub mod confidence;
pub mod preprocess;
pub mod sampler;

pub use camera::{check_camera, Camera, CameraConfig, CameraLease, DirectoryCamera};
pub use sampler::{classify_face, sample_face, SamplerConfig};
