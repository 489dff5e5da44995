mod buffers;
mod interleave;
mod mix;

pub use buffers::InstanceBuffers;
pub use interleave::{ClipDetector, interleave};
pub use mix::Mixer;
