mod common;

use sea_orm::DatabaseConnection;
use std::{collections::HashSet, sync::Arc};
use tokio::sync::mpsc;
use xjy_moderation::{
    config::moderation::ModerationConfig,
    error::AppError,
    models::ContentKey,
    services::{
        analyzer::ContentAnalyzer,
        content::DbContentStore,
        escalation::EscalationOutcome,
        notification::{Notice, NotificationDispatcher},
    },
    ModerationService,
};

/// A service with its own lock table, as a separate process would have.
fn replica(db: &DatabaseConnection, notices: &mpsc::UnboundedSender<Notice>) -> ModerationService {
    ModerationService::new(
        db.clone(),
        Arc::new(DbContentStore::new(db.clone())),
        NotificationDispatcher::spawn(Arc::new(common::RecordingSink(notices.clone()))),
        ContentAnalyzer::with_default_rules(),
        ModerationConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_escalate_once_per_batch() {
    let mut app = common::spawn_app().await;
    let (_topic_id, post_id) = common::create_thread(&app.db).await;
    let key = ContentKey::post(post_id);

    let handles: Vec<_> = (1..=12)
        .map(|reporter| {
            let service = app.service.clone();
            tokio::spawn(async move { service.submit(common::new_report(key, reporter)).await })
        })
        .collect();

    let mut batches = Vec::new();
    for handle in handles {
        let filed = handle.await.unwrap().unwrap();
        if let EscalationOutcome::Flagged {
            resolved_report_ids,
        } = filed.escalation
        {
            batches.push(resolved_report_ids);
        }
    }

    // 12 reports with a threshold of 3: four flags, each over a disjoint batch.
    assert_eq!(batches.len(), 4);
    let mut seen = HashSet::new();
    for batch in &batches {
        assert_eq!(batch.len(), 3);
        for id in batch {
            assert!(seen.insert(*id), "report {id} resolved twice");
        }
    }
    assert_eq!(seen.len(), 12);
    assert_eq!(app.service.reports().count_unresolved(key).await.unwrap(), 0);

    for _ in 0..4 {
        app.next_notice().await;
    }
    app.assert_no_notice().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_file_once() {
    let app = common::spawn_app().await;
    let (topic_id, _post_id) = common::create_thread(&app.db).await;
    let key = ContentKey::topic(topic_id);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let service = app.service.clone();
            tokio::spawn(async move { service.submit(common::new_report(key, 77)).await })
        })
        .collect();

    let mut filed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => filed += 1,
            Err(AppError::DuplicateReport) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(filed, 1);
    assert_eq!(duplicates, 5);
    assert_eq!(app.service.list_for_content(key).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_posts_escalate_independently() {
    let mut app = common::spawn_app().await;
    let topic_id = common::create_topic(&app.db, common::AUTHOR_ID).await;
    let mut posts = Vec::new();
    for _ in 0..3 {
        posts.push(common::create_post(&app.db, topic_id, common::AUTHOR_ID).await);
    }

    let mut handles = Vec::new();
    for &post_id in &posts {
        for reporter in 1..=3 {
            let service = app.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .submit(common::new_report(ContentKey::post(post_id), reporter))
                    .await
            }));
        }
    }

    let mut flagged = HashSet::new();
    for handle in handles {
        let filed = handle.await.unwrap().unwrap();
        if matches!(filed.escalation, EscalationOutcome::Flagged { .. }) {
            assert!(flagged.insert(filed.report.content_id));
        }
    }

    assert_eq!(flagged, posts.iter().copied().collect::<HashSet<_>>());
    for _ in 0..3 {
        app.next_notice().await;
    }
    app.assert_no_notice().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replicas_escalate_each_batch_once() {
    let db = common::setup_db().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let first = replica(&db, &tx);
    let second = replica(&db, &tx);
    let topic_id = common::create_topic(&db, common::AUTHOR_ID).await;

    for _ in 0..20 {
        let post_id = common::create_post(&db, topic_id, common::AUTHOR_ID).await;
        let key = ContentKey::post(post_id);
        common::seed_unresolved(&db, key, 1).await;
        common::seed_unresolved(&db, key, 2).await;

        let a = {
            let service = first.clone();
            tokio::spawn(async move { service.submit(common::new_report(key, 3)).await })
        };
        let b = {
            let service = second.clone();
            tokio::spawn(async move { service.submit(common::new_report(key, 4)).await })
        };
        let outcomes = [
            a.await.unwrap().unwrap().escalation,
            b.await.unwrap().unwrap().escalation,
        ];

        let batches: Vec<&Vec<i32>> = outcomes
            .iter()
            .filter_map(|o| match o {
                EscalationOutcome::Flagged {
                    resolved_report_ids,
                } => Some(resolved_report_ids),
                _ => None,
            })
            .collect();
        assert_eq!(batches.len(), 1, "post {post_id}: {outcomes:?}");
        assert!(batches[0].len() >= 3, "post {post_id}: {outcomes:?}");

        let unresolved = first.reports().count_unresolved(key).await.unwrap();
        assert_eq!(batches[0].len() as u64 + unresolved, 4);
    }

    first.flush_notifications().await;
    second.flush_notifications().await;
    let mut sent = 0;
    while rx.try_recv().is_ok() {
        sent += 1;
    }
    assert_eq!(sent, 20);
}
