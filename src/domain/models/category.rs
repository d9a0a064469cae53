#[cfg(test)]
#[path = "category_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

/// The kind of audio program a session is configuring.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumVariantNames,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentCategory {
    Podcast,
    Sermon,
    Audiodrama,
    Lecture,
    Commentary,
    Voicenote,
    Interview,
    Soundbite,
}

impl ContentCategory {
    pub fn parse(text: &str) -> Option<ContentCategory> {
        let text = text.trim().to_lowercase();
        return ContentCategory::iter().find(|e| return e.to_string() == text);
    }

    /// A sample prompt shown to users picking a category for the first time.
    pub fn example_prompt(&self) -> &'static str {
        match self {
            ContentCategory::Podcast => return "Create a podcast exploring the intersection of ancient philosophy and artificial intelligence.",
            ContentCategory::Sermon => return "Write a sermon connecting the teachings of Augustine with modern digital ethics.",
            ContentCategory::Audiodrama => return "A reimagining of Homer's Odyssey set in a cyberpunk future.",
            ContentCategory::Lecture => return "A lecture comparing Shakespeare's influence on modern social media communication.",
            ContentCategory::Commentary => return "A commentary on how Classical music influences contemporary electronic genres.",
            ContentCategory::Voicenote => return "A personal reflection on reading Plato's Republic in today's political climate.",
            ContentCategory::Interview => return "An interview with an archaeologist using AI to uncover ancient Roman artifacts.",
            ContentCategory::Soundbite => return "A quick take on how ancient Greek democracy shapes modern blockchain governance.",
        }
    }
}
