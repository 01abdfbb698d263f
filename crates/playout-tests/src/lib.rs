//! Integration test crate for the playout engine.
//!
//! This crate exists solely to hold cross-crate integration tests. It
//! drives a full [`playout_output::PlayoutSession`] against a scripted
//! fake device to verify the pool, scheduler, sync engine and session
//! work together.


#[cfg(test)]
mod output;
