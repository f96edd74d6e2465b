use crate::types::{Category, Mood};
use std::collections::HashMap;

/// How many categories a mood falls back to when the user picked none of its own.
pub const FALLBACK_CATEGORY_COUNT: usize = 3;

/// Mood to default categories, most relevant first.
#[derive(Debug, Clone)]
pub struct MoodTable {
    entries: HashMap<Mood, Vec<Category>>,
}

impl Default for MoodTable {
    fn default() -> Self {
        use Category::*;

        let entries = HashMap::from([
            (Mood::Happy, vec![Lifestyle, Entertainment, Food, Travel, Sports]),
            (Mood::Excited, vec![Technology, Gaming, Entertainment, Sports]),
            (Mood::Motivated, vec![Business, Health, Education, Technology]),
            (Mood::Relaxed, vec![Lifestyle, Food, Travel, Health, Environment]),
            (Mood::Sad, vec![Health, Lifestyle, Education, Environment]),
            (Mood::Stressed, vec![Health, Lifestyle, Environment, Education]),
        ]);
        Self { entries }
    }
}

impl MoodTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Replace the list for one mood.
    pub fn with_mood(mut self, mood: Mood, categories: Vec<Category>) -> Self {
        self.entries.insert(mood, categories);
        self
    }

    pub fn categories_for(&self, mood: Mood) -> &[Category] {
        self.entries.get(&mood).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick the categories a feed should draw from.
    ///
    /// The mood's list is intersected with the user's interests in mood
    /// order; with no overlap the first three mood categories are used. An
    /// explicit filter narrows that set, and replaces it outright when the
    /// two do not overlap.
    pub fn resolve_categories(
        &self,
        mood: Mood,
        user_categories: &[Category],
        explicit: Option<&[Category]>,
    ) -> Vec<Category> {
        let mood_categories = self.categories_for(mood);

        let mut resolved: Vec<Category> = mood_categories
            .iter()
            .filter(|c| user_categories.contains(c))
            .copied()
            .collect();

        if resolved.is_empty() {
            resolved = mood_categories.iter().take(FALLBACK_CATEGORY_COUNT).copied().collect();
        }

        match explicit {
            Some(explicit) if !explicit.is_empty() => {
                let narrowed: Vec<Category> = resolved.iter().filter(|c| explicit.contains(c)).copied().collect();
                if narrowed.is_empty() {
                    dedupe_categories(explicit)
                } else {
                    narrowed
                }
            }
            _ => resolved,
        }
    }
}

/// Keep the first occurrence of each category.
pub fn dedupe_categories(categories: &[Category]) -> Vec<Category> {
    let mut seen = Vec::with_capacity(categories.len());
    for category in categories {
        if !seen.contains(category) {
            seen.push(*category);
        }
    }
    seen
}
