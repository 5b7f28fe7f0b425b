pub mod audio;
pub mod device;
pub mod mixer;
pub mod platform;

pub use platform::{CpalInput, CpalOutput, CpalPlatform};
