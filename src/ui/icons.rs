pub struct Icons;

impl Icons {
    pub const DOG: &str = "🐶";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const NEW: &str = "✨";
    pub const DEL: &str = "🗑️";
    pub const DATABASE: &str = "🗄️";
    pub const GLOBE: &str = "🌍";
    pub const EMPTY: &str = "∅";
}
