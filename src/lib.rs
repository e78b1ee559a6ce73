//! Famulus - Local Command Assistant

pub mod automation;
pub mod collab;
pub mod core;
pub mod custom;
pub mod dispatch;
pub mod intent;
pub mod llm;
pub mod permission;
pub mod plugin;
pub mod state;
