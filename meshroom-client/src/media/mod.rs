mod local_media;
mod media_source;

pub use local_media::*;
pub use media_source::*;
