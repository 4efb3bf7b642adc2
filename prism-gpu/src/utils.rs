mod vec3_ext;

pub use self::vec3_ext::*;
