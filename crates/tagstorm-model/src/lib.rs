mod domain;
pub use domain::{
    DEFAULT_COUNTERS, DEFAULT_DEVICES, DEFAULT_LOCATIONS, TAG_CITY, TAG_DEVICE, Tags,
};

mod error;
pub use error::{ModelError, ModelResult};

mod event;
pub use event::TaggedIncrement;

mod vocabulary;
pub use vocabulary::Vocabulary;
