//! Intent classification for free-text commands

pub mod parser;

pub use parser::{parse, Intent, IntentKind};
