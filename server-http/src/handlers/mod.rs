pub mod objects;

pub use objects::{get_object, method_not_allowed, missing_key, put_object};
