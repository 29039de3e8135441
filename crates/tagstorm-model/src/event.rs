use crate::{TAG_CITY, TAG_DEVICE, Tags};

/// One "increment a tagged counter" unit of work.
///
/// Borrows its values from the [`crate::Vocabulary`] it was drawn from and lives
/// only for the duration of a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedIncrement<'a> {
    pub city: &'a str,
    pub device: &'a str,
    pub counter: &'a str,
}

impl TaggedIncrement<'_> {
    /// Build the `{city, device}` tag set for this event.
    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(TAG_CITY, self.city).insert(TAG_DEVICE, self.device);
        tags
    }
}
