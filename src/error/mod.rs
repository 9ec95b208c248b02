mod types;

pub use types::{KioskError, Result};
