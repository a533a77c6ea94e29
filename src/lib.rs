//! plysnap saves point clouds held by a paused Python debug session into PLY files.
//!
//! The crate talks to a debug adapter over the Debug Adapter Protocol, finds out which
//! in-memory representation an expression denotes (open3d point cloud, numpy array or
//! torch tensor) by evaluating small predicates inside the debuggee, and then runs a
//! generated program in the debuggee that writes the data to a per-session directory.

pub mod action;
pub mod config;
pub mod console;
pub mod dap;
pub mod log;
pub mod ply;
pub mod preview;
pub mod session;
