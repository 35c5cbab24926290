//! Tauri command handlers
//!
//! IPC command handlers that can be called from the frontend via Tauri's
//! invoke system.

pub mod viewfinder;
