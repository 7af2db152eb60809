mod field;
mod schema;
mod types;

pub use field::*;
pub use schema::*;
pub use types::*;
