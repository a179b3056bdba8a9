//! CAPSS: a post-quantum signature scheme built from the SmallWood
//! zero-knowledge proof system applied to a regular arithmetic permutation
//! (Anemoi) as the one-way function.
//!
//! The proof-system stack, bottom to top:
//!
//! - [`hash::merkle_tree`]: salted, arbitrary-arity Merkle tree with
//!   truncation and multi-opening;
//! - [`decs`]: degree-enforcing commitment scheme over the Merkle tree;
//! - [`lvcs`]: linear vector commitment wrapping the DECS;
//! - [`pcs`]: polynomial commitment re-layout on top of the LVCS;
//! - [`piop`]: polynomial IOP batching the LPPC constraints;
//! - [`smallwood`]: the non-interactive argument assembling PCS and PIOP;
//! - [`lppc`]: the constraint system, instantiated for one regular
//!   permutation witness;
//! - [`sign`]: the signature API on top of it all.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub use capss_field as field;

pub mod anemoi;
pub mod decs;
pub mod hash;
pub mod lppc;
pub mod lvcs;
pub mod pcs;
pub mod piop;
pub mod sign;
pub mod smallwood;
pub mod util;
