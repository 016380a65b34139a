mod mutex;
mod snowflake;
#[cfg(test)]
mod tests;

pub use mutex::*;
pub use snowflake::*;
