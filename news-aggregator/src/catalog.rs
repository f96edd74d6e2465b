use crate::types::{Category, CategoryInfo};

// (category, display name, description, icon, color)
const SEED: [(Category, &str, &str, &str, &str); 16] = [
    (Category::General, "General", "General news and current events", "📰", "#6B7280"),
    (Category::Business, "Business", "Business news and market updates", "💼", "#10B981"),
    (Category::Technology, "Technology", "Latest in tech and innovation", "💻", "#3B82F6"),
    (Category::Science, "Science", "Scientific discoveries and research", "🔬", "#8B5CF6"),
    (Category::Health, "Health", "Health and wellness news", "🏥", "#EF4444"),
    (Category::Sports, "Sports", "Sports news and updates", "⚽", "#F59E0B"),
    (Category::Entertainment, "Entertainment", "Entertainment and celebrity news", "🎬", "#EC4899"),
    (Category::Politics, "Politics", "Political news and government updates", "🏛️", "#DC2626"),
    (Category::World, "World", "International news and global events", "🌍", "#059669"),
    (Category::Finance, "Finance", "Financial markets and investment news", "💰", "#16A34A"),
    (Category::Lifestyle, "Lifestyle", "Lifestyle and culture news", "✨", "#A855F7"),
    (Category::Education, "Education", "Education and learning news", "📚", "#2563EB"),
    (Category::Environment, "Environment", "Environmental and climate news", "🌱", "#22C55E"),
    (Category::Travel, "Travel", "Travel and tourism news", "✈️", "#06B6D4"),
    (Category::Food, "Food & Cooking", "Recipes and culinary trends", "🍳", "#32D74B"),
    (Category::Gaming, "Gaming", "Video game news and reviews", "🎮", "#FF6B35"),
];

/// The curated category catalog the stores are seeded with.
pub fn default_categories() -> Vec<CategoryInfo> {
    SEED.iter()
        .enumerate()
        .map(|(i, (name, display_name, description, icon, color))| CategoryInfo {
            name: *name,
            display_name: display_name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            is_active: true,
            sort_order: i as i32 + 1,
        })
        .collect()
}

/// Active categories ordered for display.
pub fn sorted_active(mut categories: Vec<CategoryInfo>) -> Vec<CategoryInfo> {
    categories.retain(|c| c.is_active);
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    categories
}
