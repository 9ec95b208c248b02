//! Display backends. `headless` keeps surfaces in memory; `terminal` owns a
//! real terminal through crossterm.

pub mod headless;
pub mod terminal;
