//! Domain model module declarations.

pub mod launch;
pub mod monitor;
pub mod phase;
pub mod result;
pub mod session;
