mod attribute;
mod raw;
mod types;

pub use attribute::Attribute;
pub use raw::{RawAttribute, RawAttributes};
pub use types::AttributeType;
