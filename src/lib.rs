//! Follow a plotted Elite Dangerous route from the game's journal.
//!
//! The journal is tailed for jumps; each time the player reaches the next
//! system on the route, the one after it is handed to automation (the
//! clipboard or a hotkey script). Routes come from the Spansh plotters or
//! from CSV files, and the last route is saved so tracking can resume.

pub mod automation;
pub mod config;
pub mod fuel;
pub mod journal;
pub mod model;
pub mod route;
pub mod session;
pub mod spansh;
pub mod storage;
