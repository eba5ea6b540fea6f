//! whirlpool-rpc: Solana JSON-RPC collaborator for the Whirlpool quote engine
//!
//! Implements the pool reader and enumerator traits over a plain JSON-RPC
//! endpoint, decoding Whirlpool and TickArray accounts locally.

pub mod accounts;
pub mod client;
pub mod source;

pub use accounts::{decode_tick_array, decode_whirlpool, TickArrayAccount, WhirlpoolAccount};
pub use client::{AccountFilter, RpcClient, MAX_ACCOUNTS_PER_REQUEST};
pub use source::RpcPoolSource;
