//! Offline simulation of long flip sessions.

pub mod runner;
