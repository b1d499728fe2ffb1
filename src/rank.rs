/// Top-N rankings over stored repeat buckets.
use chrono::NaiveDate;

use crate::error::{QueryError, RankError};
use crate::period::{PeriodKeys, PeriodKind};
use crate::store::{AggregateStore, Category};

/// Default number of entries in a ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// One ranked counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEntry {
    pub key: String,
    pub count: u64,
}

/// A ranking plus the bucket it was computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub period_key: String,
    pub category: Category,
    pub entries: Vec<RankEntry>,
}

/// Rank a category for the period of type `period_type` containing `today`.
///
/// `period_type` is one of `total`, `year`, `month`, `day` (empty means
/// `total`).
pub fn top_n(
    store: &AggregateStore,
    group_id: i64,
    period_type: &str,
    category: Category,
    n: usize,
    today: NaiveDate,
) -> Result<Ranking, QueryError> {
    let kind = PeriodKind::parse(period_type)?;
    let keys = PeriodKeys::for_date(today);
    top_n_for_key(store, group_id, keys.get(kind), category, n)
}

/// Rank a category within an explicit bucket key such as "2024-06".
pub fn top_n_for_key(
    store: &AggregateStore,
    group_id: i64,
    period_key: &str,
    category: Category,
    n: usize,
) -> Result<Ranking, QueryError> {
    let bucket = store.snapshot(group_id, period_key)?;
    let counts = bucket.category(category);
    if counts.is_empty() {
        return Err(RankError::NoData.into());
    }

    let mut entries: Vec<RankEntry> = counts
        .iter()
        .map(|(key, count)| RankEntry {
            key: key.clone(),
            count: *count,
        })
        .collect();
    sort_ranked(&mut entries);
    entries.truncate(n);

    Ok(Ranking {
        period_key: period_key.to_string(),
        category,
        entries,
    })
}

/// Count descending, then key ascending.
fn sort_ranked(entries: &mut [RankEntry]) {
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, AggregateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AggregateStore::load(dir.path().join("repeater_data.json")).unwrap();
        (dir, store)
    }

    fn entry(key: &str, count: u64) -> RankEntry {
        RankEntry {
            key: key.to_string(),
            count,
        }
    }

    #[test]
    fn test_sorted_by_count_then_key() {
        let (_dir, store) = temp_store();
        let keys = PeriodKeys::for_date(today());
        store.record(1, &keys, 30, 10, "b").unwrap();
        store.record(1, &keys, 20, 30, "a").unwrap();
        store.record(1, &keys, 20, 30, "a").unwrap();
        store.record(1, &keys, 10, 20, "c").unwrap();

        let ranking = top_n(&store, 1, "total", Category::Repeaters, 10, today()).unwrap();
        assert_eq!(ranking.period_key, "total");
        assert_eq!(
            ranking.entries,
            vec![entry("20", 2), entry("10", 1), entry("30", 1)]
        );

        let words = top_n(&store, 1, "", Category::Words, 10, today()).unwrap();
        assert_eq!(words.entries, vec![entry("a", 2), entry("b", 1), entry("c", 1)]);
    }

    #[test]
    fn test_truncates_to_n() {
        let (_dir, store) = temp_store();
        let keys = PeriodKeys::for_date(today());
        for user in 0..15 {
            store.record(1, &keys, user + 100, user, "x").unwrap();
        }

        let ranking = top_n(&store, 1, "day", Category::Victims, DEFAULT_TOP_N, today()).unwrap();
        assert_eq!(ranking.entries.len(), DEFAULT_TOP_N);
        assert_eq!(ranking.period_key, "2025-03-15");

        let single = top_n(&store, 1, "day", Category::Words, DEFAULT_TOP_N, today()).unwrap();
        assert_eq!(single.entries, vec![entry("x", 15)]);
    }

    #[test]
    fn test_invalid_period() {
        let (_dir, store) = temp_store();
        let err = top_n(&store, 1, "week", Category::Words, 10, today()).unwrap_err();
        assert!(matches!(err, QueryError::Rank(RankError::InvalidPeriod(p)) if p == "week"));
    }

    #[test]
    fn test_no_data_for_unknown_group_or_period() {
        let (_dir, store) = temp_store();
        let err = top_n(&store, 1, "total", Category::Words, 10, today()).unwrap_err();
        assert!(matches!(err, QueryError::Rank(RankError::NoData)));

        store
            .record(1, &PeriodKeys::for_date(today()), 2, 1, "x")
            .unwrap();
        let tomorrow = today().succ_opt().unwrap();
        let err = top_n(&store, 1, "day", Category::Words, 10, tomorrow).unwrap_err();
        assert!(matches!(err, QueryError::Rank(RankError::NoData)));
        assert!(top_n(&store, 1, "month", Category::Words, 10, tomorrow).is_ok());
    }

    #[test]
    fn test_historical_bucket() {
        let (_dir, store) = temp_store();
        let june = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        store.record(1, &PeriodKeys::for_date(june), 2, 1, "x").unwrap();

        let ranking = top_n_for_key(&store, 1, "2024-06", Category::Repeaters, 10).unwrap();
        assert_eq!(ranking.entries, vec![entry("2", 1)]);
    }
}
