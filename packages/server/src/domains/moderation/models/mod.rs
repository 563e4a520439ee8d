pub mod audit_record;
pub mod rule;

pub use audit_record::*;
pub use rule::*;
