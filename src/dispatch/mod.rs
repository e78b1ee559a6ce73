//! Command resolution pipeline
//!
//! Raw command -> custom alias match -> plugin match -> built-in shortcuts
//! -> intent fallback -> permission gate -> execute -> automation chain ->
//! history record.

mod builtin;
mod dispatcher;

pub use dispatcher::{DispatchOutcome, Dispatcher};
