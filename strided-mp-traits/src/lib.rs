//! Shared traits for the strided-mp buffer family.
//!
//! This crate provides the leaf definitions every message-passing buffer
//! depends on: the closed set of primitive wire types ([`Item`],
//! [`ItemType`]) and the associative reduction operators applied when a
//! received value is folded into existing storage ([`Op`], [`ReduceOp`],
//! [`OpTable`]).
//!
//! External crates can depend on `strided-mp-traits` to write their own
//! operators against [`ReduceOp`] without pulling in the buffer views.

pub mod item;
pub mod op;

pub use item::{Item, ItemType};
pub use op::{Op, OpTable, ReduceOp, Reducible};
