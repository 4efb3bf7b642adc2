mod bindable;
mod mapped_storage_buffer;
mod mapped_uniform_buffer;

pub use self::bindable::*;
pub use self::mapped_storage_buffer::*;
pub use self::mapped_uniform_buffer::*;
