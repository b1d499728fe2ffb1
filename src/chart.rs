/// Ranking charts
///
/// Turns an already-ranked list into a horizontal bar chart. Rendering is a
/// pure function of its input; callers treat failures as "no image".
use unicode_width::UnicodeWidthStr;

use crate::error::ChartError;

/// Most bars drawn in one chart.
pub const MAX_BARS: usize = 10;

/// A rendered chart ready to be attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    pub bytes: Vec<u8>,
    /// File extension matching the encoding, e.g. "svg"
    pub extension: &'static str,
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, title: &str, rows: &[(String, u64)]) -> Result<RenderedChart, ChartError>;
}

/// SVG bar chart with the classic leaderboard layout
#[derive(Debug, Clone)]
pub struct SvgBarChart {
    pub width: u32,
    pub font_size: u32,
    pub bar_height: u32,
    pub spacing: u32,
    pub bar_color: &'static str,
}

impl Default for SvgBarChart {
    fn default() -> Self {
        Self {
            width: 800,
            font_size: 24,
            bar_height: 40,
            spacing: 20,
            bar_color: "#4f81bd",
        }
    }
}

const TOP_MARGIN: u32 = 80;
const SIDE_MARGIN: u32 = 20;
const COUNT_GUTTER: u32 = 80;

impl ChartRenderer for SvgBarChart {
    fn render(&self, title: &str, rows: &[(String, u64)]) -> Result<RenderedChart, ChartError> {
        let rows = &rows[..rows.len().min(MAX_BARS)];
        if rows.is_empty() {
            return Err(ChartError::Empty);
        }

        // Wide (CJK) characters take two columns; one column is ~0.6em.
        let label_columns = rows
            .iter()
            .enumerate()
            .map(|(i, (name, _))| label(i, name).width() as u64)
            .max()
            .unwrap_or(0);
        let label_px = label_columns.saturating_mul(u64::from(self.font_size)) * 6 / 10;
        let bar_x = (u64::from(SIDE_MARGIN) + label_px + 10).min(u64::from(self.width / 2)) as u32;
        let max_bar = self.width.saturating_sub(bar_x + COUNT_GUTTER).max(1);
        let max_count = rows.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);

        let row_step = self.bar_height + self.spacing;
        let height = TOP_MARGIN + rows.len() as u32 * row_step + SIDE_MARGIN;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = self.width,
            h = height
        ));
        svg.push_str(&format!(
            "<rect width=\"{}\" height=\"{}\" fill=\"#ffffff\"/>\n",
            self.width, height
        ));
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\" text-anchor=\"middle\" dominant-baseline=\"hanging\" fill=\"#000000\">{}</text>\n",
            self.width / 2,
            20,
            self.font_size,
            escape_xml(title)
        ));

        for (index, (name, count)) in rows.iter().enumerate() {
            let y = TOP_MARGIN + index as u32 * row_step;
            let mid = y + self.bar_height / 2;
            let bar_width = ((*count as f64 / max_count as f64) * max_bar as f64).round() as u32;

            svg.push_str(&format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>\n",
                bar_x, y, bar_width, self.bar_height, self.bar_color
            ));
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" font-size=\"{}\" text-anchor=\"end\" dominant-baseline=\"middle\" fill=\"#000000\">{}</text>\n",
                bar_x.saturating_sub(10),
                mid,
                self.font_size,
                escape_xml(&label(index, name))
            ));
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" font-size=\"{}\" dominant-baseline=\"middle\" fill=\"#000000\">{}</text>\n",
                bar_x + bar_width + 10,
                mid,
                self.font_size,
                count
            ));
        }
        svg.push_str("</svg>\n");

        Ok(RenderedChart {
            bytes: svg.into_bytes(),
            extension: "svg",
        })
    }
}

fn label(index: usize, name: &str) -> String {
    format!("{}. {}", index + 1, name)
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<(String, u64)> {
        (0..n)
            .map(|i| (format!("user{}", i), (n - i) as u64))
            .collect()
    }

    #[test]
    fn test_render_svg() {
        let chart = SvgBarChart::default()
            .render("🏆 复读机排行榜 (total)", &rows(3))
            .unwrap();
        assert_eq!(chart.extension, "svg");

        let svg = String::from_utf8(chart.bytes).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("复读机排行榜 (total)"));
        assert!(svg.contains("1. user0"));
        assert!(svg.contains("3. user2"));
        assert_eq!(svg.matches("fill=\"#4f81bd\"").count(), 3);
    }

    #[test]
    fn test_render_caps_bars() {
        let chart = SvgBarChart::default().render("t", &rows(15)).unwrap();
        let svg = String::from_utf8(chart.bytes).unwrap();
        assert_eq!(svg.matches("fill=\"#4f81bd\"").count(), MAX_BARS);
        assert!(!svg.contains("11. "));
    }

    #[test]
    fn test_escapes_labels() {
        let data = vec![("<b>&\"x\"".to_string(), 1)];
        let chart = SvgBarChart::default().render("t", &data).unwrap();
        let svg = String::from_utf8(chart.bytes).unwrap();
        assert!(svg.contains("1. &lt;b&gt;&amp;&quot;x&quot;"));
        assert!(!svg.contains("<b>"));
    }

    #[test]
    fn test_oversized_label_is_clamped() {
        let chart = SvgBarChart {
            font_size: 1 << 30,
            ..SvgBarChart::default()
        };
        let data = vec![("复读".repeat(500), 3)];
        let svg = String::from_utf8(chart.render("t", &data).unwrap().bytes).unwrap();
        assert!(svg.contains("<rect x=\"400\""));
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(
            SvgBarChart::default().render("t", &[]),
            Err(ChartError::Empty)
        ));
    }
}
