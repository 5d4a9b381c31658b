use bunpo_core::MasteryTotals;
use bunpo_core::model::{GrammarPoint, GrammarPointId, JlptLevel, Mastery, Question, QuestionId};
use storage::repository::{
    GrammarPointRepository, MasteryRepository, QuestionRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

fn point(id: u64, level: Option<JlptLevel>) -> GrammarPoint {
    GrammarPoint::new(
        GrammarPointId::new(id),
        format!("〜文法{id}"),
        level,
        format!("meaning {id}"),
        format!("explanation {id}"),
    )
}

fn question(id: u64, grammar_point: u64, mastery: u32) -> Question {
    Question {
        id: QuestionId::new(id),
        grammar_point_id: GrammarPointId::new(grammar_point),
        prompt: format!("質問{id}"),
        correct_option: "正しい".into(),
        incorrect_options: ["違う1".into(), "違う2".into(), "違う3".into()],
        answer: format!("答え{id}"),
        translation: format!("translation {id}"),
        mastery: Mastery::new(mastery).unwrap(),
    }
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_grammar_points_and_questions() {
    let repo = connect("memdb_roundtrip").await;

    repo.insert_grammar_points(&[point(1, Some(JlptLevel::N5)), point(2, None)])
        .await
        .unwrap();
    repo.insert_questions(&[question(1, 1, 0), question(2, 2, 3)])
        .await
        .unwrap();

    let points = repo.list_grammar_points().await.unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0], point(1, Some(JlptLevel::N5)));
    assert_eq!(points[1].level, None);

    let questions = repo.list_questions().await.unwrap();
    assert_eq!(questions, vec![question(1, 1, 0), question(2, 2, 3)]);
}

#[tokio::test]
async fn sqlite_aggregates_mastery_per_grammar_point() {
    let repo = connect("memdb_aggregates").await;
    let totals = repo.watch_total_mastery();
    assert_eq!(*totals.borrow(), Ok(MasteryTotals { sum: None, count: 0 }));

    repo.insert_grammar_points(&[point(1, None), point(2, None), point(3, None)])
        .await
        .unwrap();
    repo.insert_questions(&[question(1, 1, 3), question(2, 1, 4), question(3, 2, 5)])
        .await
        .unwrap();

    assert_eq!(
        *totals.borrow(),
        Ok(MasteryTotals {
            sum: Some(12),
            count: 3
        })
    );

    let rows = repo
        .watch_mastery_by_grammar_point()
        .borrow()
        .clone()
        .unwrap();
    assert_eq!(rows.len(), 2, "grammar point 3 has no questions and no row");
    assert_eq!(rows[0].grammar_point_id, GrammarPointId::new(1));
    assert_eq!((rows[0].sum, rows[0].count), (Some(7), 2));
    assert_eq!((rows[1].sum, rows[1].count), (Some(5), 1));
}

#[tokio::test]
async fn sqlite_update_mastery_republishes_feeds() {
    let repo = connect("memdb_update").await;
    repo.insert_grammar_points(&[point(1, None)]).await.unwrap();
    repo.insert_questions(&[question(1, 1, 0)]).await.unwrap();

    let mut questions = repo.watch_questions();
    let _ = questions.borrow_and_update();

    repo.update_mastery(QuestionId::new(1), Mastery::new(2).unwrap())
        .await
        .unwrap();

    assert!(questions.has_changed().unwrap());
    let latest = questions.borrow_and_update().clone().unwrap();
    assert_eq!(latest[0].mastery.value(), 2);

    assert_eq!(
        repo.update_mastery(QuestionId::new(99), Mastery::MAX).await,
        Err(StorageError::NotFound)
    );
}

#[tokio::test]
async fn sqlite_rejects_orphan_questions() {
    let repo = connect("memdb_orphans").await;
    let err = repo
        .insert_questions(&[question(1, 42, 0)])
        .await
        .unwrap_err();
    assert_eq!(err, StorageError::Conflict);
}

#[tokio::test]
async fn sqlite_delete_cascades_to_questions() {
    let repo = connect("memdb_cascade").await;
    repo.insert_grammar_points(&[point(1, None), point(2, None)])
        .await
        .unwrap();
    repo.insert_questions(&[question(1, 1, 1), question(2, 1, 1), question(3, 2, 4)])
        .await
        .unwrap();

    repo.delete_grammar_point(GrammarPointId::new(1))
        .await
        .unwrap();

    let remaining = repo.list_questions().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, QuestionId::new(3));
    assert_eq!(
        repo.watch_total_mastery().borrow().clone().unwrap(),
        MasteryTotals {
            sum: Some(4),
            count: 1
        }
    );
}

#[tokio::test]
async fn sqlite_reinserting_grammar_point_keeps_its_questions() {
    let repo = connect("memdb_upsert").await;
    repo.insert_grammar_points(&[point(1, None)]).await.unwrap();
    repo.insert_questions(&[question(1, 1, 2)]).await.unwrap();

    let mut updated = point(1, Some(JlptLevel::N4));
    updated.meaning = "new meaning".into();
    repo.insert_grammar_points(&[updated.clone()]).await.unwrap();

    assert_eq!(repo.list_grammar_points().await.unwrap(), vec![updated]);
    assert_eq!(repo.list_questions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_lists_grammar_points_and_questions_by_id() {
    let repo = connect("memdb_ordering").await;
    repo.insert_grammar_points(&[point(3, None), point(1, None), point(2, None)])
        .await
        .unwrap();
    repo.insert_grammar_points(&[point(3, Some(JlptLevel::N4))])
        .await
        .unwrap();
    repo.insert_questions(&[question(9, 1, 0), question(4, 2, 0)])
        .await
        .unwrap();

    let ids: Vec<_> = repo
        .list_grammar_points()
        .await
        .unwrap()
        .iter()
        .map(|p| p.id.value())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let question_ids: Vec<_> = repo
        .list_questions()
        .await
        .unwrap()
        .iter()
        .map(|q| q.id.value())
        .collect();
    assert_eq!(question_ids, vec![4, 9]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_concurrent_updates_leave_feeds_current() {
    let path = std::env::temp_dir().join(format!(
        "bunpo_concurrent_updates_{}.sqlite3",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");

    repo.insert_grammar_points(&[point(1, None), point(2, None)])
        .await
        .unwrap();
    let questions: Vec<_> = (1..=24).map(|id| question(id, 1 + id % 2, 0)).collect();
    repo.insert_questions(&questions).await.unwrap();

    let writers: Vec<_> = (1..=24)
        .map(|id| {
            let repo = repo.clone();
            tokio::spawn(async move {
                let mastery = Mastery::new(u32::try_from(id % 6).unwrap()).unwrap();
                repo.update_mastery(QuestionId::new(id), mastery).await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let stored: u32 = repo
        .list_questions()
        .await
        .unwrap()
        .iter()
        .map(|q| q.mastery.value())
        .sum();
    let fresh: i64 = sqlx::query_scalar("SELECT SUM(mastery_level) FROM questions")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(i64::from(stored), fresh);

    let totals = repo.watch_total_mastery();
    assert_eq!(
        totals.borrow().clone(),
        Ok(MasteryTotals {
            sum: Some(stored),
            count: 24,
        })
    );
    let per_point: u32 = repo
        .watch_mastery_by_grammar_point()
        .borrow()
        .as_ref()
        .unwrap()
        .iter()
        .filter_map(|row| row.sum)
        .sum();
    assert_eq!(per_point, stored);
    let published: u32 = repo
        .watch_questions()
        .borrow()
        .as_ref()
        .unwrap()
        .iter()
        .map(|q| q.mastery.value())
        .sum();
    assert_eq!(published, stored);

    repo.pool().close().await;
    let _ = std::fs::remove_file(&path);
}
