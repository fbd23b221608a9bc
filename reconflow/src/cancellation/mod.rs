//! Cooperative cancellation of a run and its subprocesses.

mod token;

pub use token::CancellationToken;
