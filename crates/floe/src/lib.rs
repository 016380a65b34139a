mod error;
mod generator;
mod id;
mod time;
mod validator;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::time::*;
pub use crate::validator::*;
