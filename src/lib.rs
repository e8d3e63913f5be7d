//! Block-unlocking and reward-distribution core for an Ethash-style
//! mining pool: matches block candidates against canonical chain state,
//! computes rewards (including uncle inclusion and transaction fees),
//! apportions them across contributing miners by share count, and
//! advances candidates through the `immature -> matured` pipeline.

pub mod candidate;
pub mod chain;
pub mod config;
pub mod error;
pub mod matcher;
pub mod reward;
pub mod shutdown;
pub mod store;
#[cfg(test)]
pub mod testutil;
pub mod units;
pub mod unlocker;
