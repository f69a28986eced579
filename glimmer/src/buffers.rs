mod double_buffered;
mod frame_texture;
mod growable_buffer;

pub use self::double_buffered::*;
pub use self::frame_texture::*;
pub use self::growable_buffer::*;
