pub mod decode;
pub mod mic;
pub mod pitch;
pub mod source;
pub mod spectrum;
pub mod window;
