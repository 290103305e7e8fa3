// Library root: re-exports all modules so integration tests and the binary
// can access the crate's public API.

pub mod marketplace;
pub mod poll;
pub mod processor;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod fakes;
