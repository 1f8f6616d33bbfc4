pub mod config;
pub mod run;

/// No duplicate claim was observed.
pub const EXIT_CLEAN: u8 = 0;
/// At least one slot was claimed twice.
pub const EXIT_COLLISIONS: u8 = 1;
/// Configuration or startup failure; no run took place.
pub const EXIT_STARTUP: u8 = 2;
/// `--require-coverage` was given and some slot was never claimed.
pub const EXIT_INCOMPLETE: u8 = 3;
