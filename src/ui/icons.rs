pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const PERSON: &str = "👤";
    pub const PHONE: &str = "📱";
    pub const HOUSE: &str = "🏠";
    pub const DATABASE: &str = "🗄️";
}
