pub mod config;
pub mod logging;

pub mod control;
pub mod greeting;
pub mod retry;
pub mod supervisor;

#[cfg(test)]
mod test_support;
