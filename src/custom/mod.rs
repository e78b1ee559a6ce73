//! User-defined command aliases and their persistent store

pub mod store;

pub use store::{CustomCommand, CustomCommandStore, CustomCommandUpdate, CustomMatch};
