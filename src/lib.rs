pub mod config;
pub mod curve;
pub mod detect;
pub mod driver;
pub mod keyboard;
pub mod keys;
pub mod mapping;
pub mod pad;
pub mod report;
pub mod state;
