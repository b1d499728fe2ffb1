use anyhow::Result;

use crate::config::Config;
use crate::store::{AggregateStore, GroupSummary};

/// Render the per-group overview printed by `repeater status`.
pub fn render(summaries: &[GroupSummary]) -> String {
    let groups: Vec<&GroupSummary> = summaries
        .iter()
        .filter(|summary| summary.buckets > 0)
        .collect();

    if groups.is_empty() {
        return "No repeats recorded yet.\n".to_string();
    }

    let mut output = String::new();
    for summary in groups {
        output.push_str(&format!("\nGroup: {}\n", summary.group_id));
        output.push_str(&format!("  Repeats (all time): {}\n", summary.total_repeats));
        output.push_str(&format!("  Period buckets: {}\n", summary.buckets));
    }
    output
}

pub fn run(config: &Config) -> Result<()> {
    let data_file = config.data_file();
    println!("Data file: {}", data_file.display());
    if !data_file.exists() {
        println!("  [!] Data file missing (no repeats recorded yet)");
        return Ok(());
    }

    let store = AggregateStore::load(&data_file)?;
    print!("{}", render(&store.summary()?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_skips_empty_groups() {
        let summaries = vec![
            GroupSummary {
                group_id: "total".to_string(),
                buckets: 0,
                total_repeats: 0,
            },
            GroupSummary {
                group_id: "123".to_string(),
                buckets: 4,
                total_repeats: 7,
            },
        ];

        let output = render(&summaries);
        assert!(!output.contains("Group: total"));
        assert!(output.contains("Group: 123"));
        assert!(output.contains("Repeats (all time): 7"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No repeats recorded yet.\n");
    }
}
