mod tags;
pub use tags::Tags;

mod constants;
pub use constants::{DEFAULT_COUNTERS, DEFAULT_DEVICES, DEFAULT_LOCATIONS, TAG_CITY, TAG_DEVICE};
