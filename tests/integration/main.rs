//! End-to-end tests driving the engine through its public API.

mod session_flow;
mod simulation;
