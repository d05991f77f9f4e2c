//! Backend for the on-chain polling dApp.
//!
//! Syncs the voting contract's poll catalog through the Hiro API, derives
//! per-user participation from transaction history, and keeps cached state
//! in step with push notifications of contract events.

pub mod actions;
pub mod cache;
pub mod catalog;
pub mod clarity;
pub mod config;
pub mod events;
pub mod hiro;
pub mod history;
pub mod poll;
pub mod server;
pub mod service;
