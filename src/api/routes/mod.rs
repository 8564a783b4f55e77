//! API Routes
//!
//! Route handlers organized by functionality.

pub mod agents;
pub mod attribution;
pub mod email;
pub mod health;
pub mod leads;
