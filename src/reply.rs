/// Rank commands and the replies sent back to a group.
use crate::chart::RenderedChart;
use crate::store::Category;

/// Reply to a period argument that is not one of the four types.
pub const INVALID_PERIOD_MESSAGE: &str = "请使用正确的时段类型：total（默认）、year、month、day";

/// Reply when the requested bucket holds no repeats.
pub const NO_DATA_MESSAGE: &str = "该时段暂无复读数据哦～";

/// Reply when the counters cannot be read at all.
pub const UNAVAILABLE_MESSAGE: &str = "复读统计暂时不可用，请稍后再试";

const COMMANDS: &[(&str, Category)] = &[
    ("被复读排行", Category::Victims),
    ("受害者排行", Category::Victims),
    ("复读词排行", Category::Words),
    ("复读排行", Category::Repeaters),
    ("复读统计", Category::Repeaters),
];

/// A parsed rank command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub category: Category,
    /// Raw period argument, possibly empty
    pub period: String,
}

impl Command {
    /// Recognise a rank command, with or without a leading '/'.
    ///
    /// The argument is whatever follows the command name, trimmed.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('/').unwrap_or(text);
        COMMANDS.iter().find_map(|(name, category)| {
            text.strip_prefix(name).map(|rest| Command {
                category: *category,
                period: rest.trim().to_string(),
            })
        })
    }
}

/// Leaderboard heading for a category.
pub fn title(category: Category) -> &'static str {
    match category {
        Category::Repeaters => "🏆 复读机排行榜",
        Category::Victims => "😵 受害者排行榜",
        Category::Words => "🔥 热词排行榜",
    }
}

pub fn chart_title(category: Category, period_key: &str) -> String {
    format!("{} ({})", title(category), period_key)
}

/// Text leaderboard: heading line, then "N. name - count次" per row.
pub fn format_ranking(category: Category, period_key: &str, rows: &[(String, u64)]) -> String {
    let mut output = format!("{}（{}）\n", title(category), period_key);
    let lines: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, (name, count))| format!("{}. {} - {}次", i + 1, name, count))
        .collect();
    output.push_str(&lines.join("\n"));
    output
}

/// What goes back to the group: always text, sometimes an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub image: Option<RenderedChart>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}
