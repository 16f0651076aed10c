//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the
//! individual workspace crates (`core-player`, `core-runtime`,
//! `host-bridge`). Host applications can depend on `tonearm-workspace` and
//! enable the documented features without wiring each crate individually.
