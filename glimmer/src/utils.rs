mod bounding_box;

pub use self::bounding_box::*;
