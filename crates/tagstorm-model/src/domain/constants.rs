//! Well-known tag keys and vocabulary sizes.

/// Tag key carrying the location of an emitted event.
pub const TAG_CITY: &str = "city";

/// Tag key carrying the device version of an emitted event.
pub const TAG_DEVICE: &str = "device";

/// Number of generated locations (`city0..city499`).
pub const DEFAULT_LOCATIONS: usize = 500;

/// Number of generated device versions (`version0..version99`).
pub const DEFAULT_DEVICES: usize = 100;

/// Number of generated counter names (`counter0..counter9`).
pub const DEFAULT_COUNTERS: usize = 10;
