pub mod error;
pub mod time;
pub mod value;

pub use value::{Dataset, Options, Record, Value};
