//! Route table: the fixed, ordered set of page keys the kiosk preloads.
//!
//! Callers import from here; the implementation lives in the private `core`
//! module.

mod core;

pub use self::core::{RouteEntry, RouteError, RouteTable};
