//! Ordered, multi-valued symbol table with typed key addressing.
//!
//! See [`key`] for the bracket-suffix grammar (`K`, `K[n]`, `K[]`, `K[#]`,
//! `K[*]`, `K[@]`) and [`table::SymbolTable`] for the storage and
//! set/append/resolve semantics built on top of it.

pub mod key;
pub mod table;

pub use key::{KeyClass, KeyType};
pub use table::{SymbolTable, SymtabError};
