/// Repeat tracking service
///
/// Owns the detector, the counter store and the presentation collaborators,
/// and exposes the two entry points a chat connector needs: feed an inbound
/// message, answer a rank command.
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::chart::ChartRenderer;
use crate::detector::{Outcome, RepeatDetector};
use crate::error::{QueryError, RankError};
use crate::names::{MemberDirectory, NameResolver};
use crate::period::PeriodKeys;
use crate::rank::{self, Ranking};
use crate::reply::{self, Command, Reply};
use crate::store::AggregateStore;

/// A detected repeat; only its effect on the counters is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatEvent {
    pub group_id: i64,
    pub repeater_id: i64,
    pub victim_id: i64,
    pub text: String,
}

pub struct RepeaterService<D> {
    detector: RepeatDetector,
    store: AggregateStore,
    resolver: NameResolver<D>,
    renderer: Option<Box<dyn ChartRenderer>>,
    top_n: usize,
}

impl<D: MemberDirectory> RepeaterService<D> {
    pub fn new(store: AggregateStore, resolver: NameResolver<D>, top_n: usize) -> Self {
        Self {
            detector: RepeatDetector::new(),
            store,
            resolver,
            renderer: None,
            top_n,
        }
    }

    /// Attach chart images to rank replies.
    pub fn with_renderer(mut self, renderer: Box<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Feed one inbound group message, filed under today's local date.
    pub fn handle_message(&self, group_id: i64, user_id: i64, text: &str) -> Option<RepeatEvent> {
        self.handle_message_on(Local::now().date_naive(), group_id, user_id, text)
    }

    /// Feed one inbound group message, filed under `date`.
    ///
    /// Returns the repeat event if the message was one. A failed flush is
    /// logged and does not stop processing; the counters stay in memory.
    pub fn handle_message_on(
        &self,
        date: NaiveDate,
        group_id: i64,
        user_id: i64,
        text: &str,
    ) -> Option<RepeatEvent> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let victim_id = match self.detector.classify(group_id, user_id, text) {
            Outcome::NotRepeat => return None,
            Outcome::Repeat { victim_id } => victim_id,
        };

        let keys = PeriodKeys::for_date(date);
        if let Err(e) = self.store.record(group_id, &keys, user_id, victim_id, text) {
            tracing::error!("Repeat in group {} not persisted: {}", group_id, e);
        }

        Some(RepeatEvent {
            group_id,
            repeater_id: user_id,
            victim_id,
            text: text.to_owned(),
        })
    }

    /// Answer a rank command for today's periods.
    pub async fn rank(&self, group_id: i64, command: &Command) -> Reply {
        self.rank_on(Local::now().date_naive(), group_id, command)
            .await
    }

    /// Answer a rank command for the periods containing `date`.
    pub async fn rank_on(&self, date: NaiveDate, group_id: i64, command: &Command) -> Reply {
        let ranking = match rank::top_n(
            &self.store,
            group_id,
            &command.period,
            command.category,
            self.top_n,
            date,
        ) {
            Ok(ranking) => ranking,
            Err(QueryError::Rank(RankError::InvalidPeriod(_))) => {
                return Reply::text(reply::INVALID_PERIOD_MESSAGE)
            }
            Err(QueryError::Rank(RankError::NoData)) => return Reply::text(reply::NO_DATA_MESSAGE),
            Err(QueryError::Store(e)) => {
                tracing::error!("Ranking for group {} failed: {}", group_id, e);
                return Reply::text(reply::UNAVAILABLE_MESSAGE);
            }
        };

        let rows = self.labelled_rows(group_id, &ranking).await;
        let text = reply::format_ranking(ranking.category, &ranking.period_key, &rows);
        let image = self.renderer.as_ref().and_then(|renderer| {
            let title = reply::chart_title(ranking.category, &ranking.period_key);
            match renderer.render(&title, &rows) {
                Ok(chart) => Some(chart),
                Err(e) => {
                    tracing::warn!("Chart for group {} not rendered: {}", group_id, e);
                    None
                }
            }
        });

        Reply { text, image }
    }

    /// Pair each ranked count with its label: display names for user-keyed
    /// categories, the stored text for words.
    pub async fn labelled_rows(&self, group_id: i64, ranking: &Ranking) -> Vec<(String, u64)> {
        let names = if ranking.category.is_user_keyed() {
            self.display_names(group_id, &ranking.entries).await
        } else {
            ranking.entries.iter().map(|e| e.key.clone()).collect()
        };
        names
            .into_iter()
            .zip(ranking.entries.iter().map(|e| e.count))
            .collect()
    }

    async fn display_names(&self, group_id: i64, entries: &[rank::RankEntry]) -> Vec<String> {
        let ids: Vec<Option<i64>> = entries.iter().map(|e| e.key.parse().ok()).collect();
        let lookup: Vec<i64> = ids.iter().flatten().copied().collect();
        let mut resolved = self.resolver.resolve_all(group_id, &lookup).await.into_iter();

        entries
            .iter()
            .zip(ids)
            .map(|(entry, id)| match id {
                Some(_) => resolved.next().unwrap_or_else(|| entry.key.clone()),
                None => entry.key.clone(),
            })
            .collect()
    }
}
