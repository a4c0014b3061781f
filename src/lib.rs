//! A fixed-size store for the register rules of a DWARF CFA program, usable
//! from a signal handler.
//!
//! The CFA interpreter feeds it `DW_CFA_*` register rules with
//! [`CfaStack::set_register`] and friends, and `DW_CFA_remember_state` /
//! `DW_CFA_restore_state` with [`CfaStack::push_state`] /
//! [`CfaStack::pop_state`]. The frame walker then reads the final rule set
//! back with [`CfaStack::iter`].
//!
//! See https://dwarfstd.org/doc/DWARF5.pdf §6.4 Call Frame Information.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate tracing;

pub mod config;
mod error;
mod iter;
mod pool;
mod rule;
mod stack;
pub mod stdext;
mod table;

pub use error::{Error, Result};
pub use iter::CfaStackIter;
pub use rule::{RegisterEntry, RegisterRule};
pub use stack::CfaStack;
