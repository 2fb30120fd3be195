#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod agent;
mod ballot;
mod ciphertext;
mod config;
mod decryption;
mod election;
mod error;
mod group;
mod keygen;
mod orchestrator;
mod serde_hex;
mod state;
mod store;
mod tally;
mod transcript;
mod trustee;

pub mod ecies;
pub mod mix;

pub use agent::*;
pub use ballot::*;
pub use ciphertext::*;
pub use config::*;
pub use decryption::*;
pub use election::*;
pub use error::*;
pub use group::*;
pub use keygen::*;
pub use mix::*;
pub use orchestrator::*;
pub use serde_hex::*;
pub use state::*;
pub use store::*;
pub use tally::*;
pub use trustee::*;

#[cfg(test)]
mod tests;
