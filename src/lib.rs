//! Gemswap (workspace facade crate).
//!
//! Keeps a single `gemswap::{core,adapter,types}` public API while the
//! implementation lives in dedicated crates under `crates/`.

pub use gemswap_adapter as adapter;
pub use gemswap_core as core;
pub use gemswap_types as types;
