use chrono::NaiveDate;
use std::collections::HashMap;

use repeater::error::{QueryError, RankError};
use repeater::names::{JsonDirectory, MemberInfo, NameResolver};
use repeater::rank::{self, RankEntry};
use repeater::reply::{self, Command};
use repeater::{AggregateStore, Category, RepeaterService};

const ALICE: i64 = 1001;
const BOB: i64 = 1002;
const CAROL: i64 = 1003;
const GROUP: i64 = 1;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
}

fn entry(key: i64, count: u64) -> RankEntry {
    RankEntry {
        key: key.to_string(),
        count,
    }
}

fn members() -> JsonDirectory {
    let mut group = HashMap::new();
    group.insert(
        ALICE,
        MemberInfo {
            card: Some("Alice".to_string()),
            nickname: Some("alice".to_string()),
        },
    );
    group.insert(
        BOB,
        MemberInfo {
            card: None,
            nickname: Some("Bob".to_string()),
        },
    );
    let mut all = HashMap::new();
    all.insert(GROUP, group);
    JsonDirectory::from_members(all)
}

fn open(dir: &tempfile::TempDir) -> RepeaterService<JsonDirectory> {
    let store = AggregateStore::load(dir.path().join("repeater_data.json")).unwrap();
    RepeaterService::new(store, NameResolver::new(members(), 16), 10)
}

fn ranking(
    service: &RepeaterService<JsonDirectory>,
    category: Category,
) -> Result<Vec<RankEntry>, QueryError> {
    rank::top_n(service.store(), GROUP, "total", category, 10, today()).map(|r| r.entries)
}

#[test]
fn hi_from_alice_then_bob() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    service.handle_message_on(today(), GROUP, ALICE, "hi");
    service.handle_message_on(today(), GROUP, BOB, "hi");

    assert_eq!(ranking(&service, Category::Repeaters).unwrap(), vec![entry(BOB, 1)]);
    assert_eq!(ranking(&service, Category::Victims).unwrap(), vec![entry(ALICE, 1)]);
    assert_eq!(
        ranking(&service, Category::Words).unwrap(),
        vec![RankEntry {
            key: "hi".to_string(),
            count: 1
        }]
    );
}

#[test]
fn hi_bounces_back_to_alice() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    for user in [ALICE, BOB, ALICE] {
        service.handle_message_on(today(), GROUP, user, "hi");
    }

    // Equal counts: ordered by key.
    assert_eq!(
        ranking(&service, Category::Repeaters).unwrap(),
        vec![entry(ALICE, 1), entry(BOB, 1)]
    );
    assert_eq!(
        ranking(&service, Category::Victims).unwrap(),
        vec![entry(ALICE, 1), entry(BOB, 1)]
    );
    assert_eq!(ranking(&service, Category::Words).unwrap()[0].count, 2);
}

#[test]
fn chain_of_k_distinct_users_yields_k_minus_one_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    let events: Vec<_> = [ALICE, BOB, CAROL]
        .iter()
        .filter_map(|user| service.handle_message_on(today(), GROUP, *user, "+1"))
        .collect();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].victim_id, ALICE);
    assert_eq!(events[1].victim_id, BOB);
    assert_eq!(
        ranking(&service, Category::Victims).unwrap(),
        vec![entry(ALICE, 1), entry(BOB, 1)]
    );
}

#[test]
fn empty_text_never_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    assert!(service.handle_message_on(today(), GROUP, ALICE, "").is_none());
    assert!(service.handle_message_on(today(), GROUP, BOB, "").is_none());
    assert!(service.handle_message_on(today(), GROUP, CAROL, "  ").is_none());
    assert_eq!(
        ranking(&service, Category::Words).unwrap_err().to_string(),
        QueryError::Rank(RankError::NoData).to_string()
    );
}

#[test]
fn buckets_are_filed_under_the_recording_day() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    let late = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    service.handle_message_on(late, GROUP, ALICE, "happy new year");
    service.handle_message_on(late, GROUP, BOB, "happy new year");

    let next_day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    for period in ["day", "month", "year"] {
        let err = rank::top_n(service.store(), GROUP, period, Category::Words, 10, next_day)
            .unwrap_err();
        assert!(matches!(err, QueryError::Rank(RankError::NoData)));
    }
    assert!(rank::top_n(service.store(), GROUP, "total", Category::Words, 10, next_day).is_ok());
    assert!(
        rank::top_n_for_key(service.store(), GROUP, "2024-12-31", Category::Words, 10).is_ok()
    );
}

#[test]
fn counters_survive_restart_but_last_message_does_not() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = open(&dir);
        service.handle_message_on(today(), GROUP, ALICE, "hi");
        service.handle_message_on(today(), GROUP, BOB, "hi");
    }

    let service = open(&dir);
    assert_eq!(ranking(&service, Category::Repeaters).unwrap(), vec![entry(BOB, 1)]);

    // The slot is volatile, so this cannot repeat a pre-restart message.
    assert!(service.handle_message_on(today(), GROUP, CAROL, "hi").is_none());
}

#[test]
fn groups_do_not_share_counters() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    service.handle_message_on(today(), GROUP, ALICE, "hi");
    service.handle_message_on(today(), 2, BOB, "hi");

    assert!(matches!(
        ranking(&service, Category::Words),
        Err(QueryError::Rank(RankError::NoData))
    ));
}

#[tokio::test]
async fn rank_commands_reply_with_names() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(&dir);

    for user in [ALICE, BOB, CAROL, ALICE] {
        service.handle_message_on(today(), GROUP, user, "复读");
    }

    let repeaters = service
        .rank_on(today(), GROUP, &Command::parse("复读排行").unwrap())
        .await;
    assert_eq!(
        repeaters.text,
        format!(
            "🏆 复读机排行榜（total）\n1. Alice - 1次\n2. Bob - 1次\n3. {} - 1次",
            CAROL
        )
    );

    let victims = service
        .rank_on(today(), GROUP, &Command::parse("被复读排行 month").unwrap())
        .await;
    assert!(victims.text.starts_with("😵 受害者排行榜（2025-03）\n"));

    let words = service
        .rank_on(today(), GROUP, &Command::parse("复读词排行 day").unwrap())
        .await;
    assert_eq!(words.text, "🔥 热词排行榜（2025-03-15）\n1. 复读 - 3次");

    let invalid = service
        .rank_on(today(), GROUP, &Command::parse("复读排行 week").unwrap())
        .await;
    assert_eq!(invalid.text, reply::INVALID_PERIOD_MESSAGE);

    let empty = service
        .rank_on(today(), 99, &Command::parse("复读排行").unwrap())
        .await;
    assert_eq!(empty.text, reply::NO_DATA_MESSAGE);
}
