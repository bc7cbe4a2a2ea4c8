mod common;

use common::{
    Behavior, MockSession, MockSessionFactory, ScriptedHandler, init_tracing, items, test_config,
};
use kodegen_tools_mediascrape::{
    AuthMethod, HandlerRegistry, MediaItem, Pagination, RunController, RunReport, StopReason,
    Strategy,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

fn item(url: &str) -> MediaItem {
    MediaItem::from_url(url)
}

#[tokio::test]
async fn test_results_merge_in_seed_order_with_dedup() {
    init_tracing();
    let config = test_config("https://a.com/one")
        .start_url("https://a.com/two")
        .paginate(false)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("a", "a.com").dom(Behavior::per_page(vec![
        ("https://a.com/one", vec![item("https://a.com/x.jpg"), item("https://a.com/y.jpg")]),
        ("https://a.com/two", vec![item("https://a.com/y.jpg?v=2"), item("https://a.com/z.jpg")]),
    ]));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let controller = RunController::new(config, registry, factory.clone()).unwrap();
    let report = controller.run().await;

    let urls: Vec<&str> = report.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.com/x.jpg", "https://a.com/y.jpg", "https://a.com/z.jpg"]);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.total_pages_visited, 2);
    assert_eq!(report.seeds[0].url, "https://a.com/one");
    assert_eq!(report.seeds[1].items_found, 2);
    assert!(report.seeds.iter().all(|s| s.stop_reason == StopReason::Completed));
    assert!(!report.is_partial());

    assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(factory.sessions().len(), 2);
    assert!(factory.sessions().iter().all(|s| s.state().closed));
    assert!(!report.log.is_empty());
}

#[tokio::test]
async fn test_url_dedup_can_be_disabled() {
    let config = test_config("https://a.com/one")
        .start_url("https://a.com/two")
        .paginate(false)
        .dedup_urls(false)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("a", "a.com").dom(Behavior::Items(items("same", 2)));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    assert_eq!(report.items.len(), 4);
    assert_eq!(report.duplicates_removed, 0);
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    let config = test_config("https://a.com/1")
        .start_url("https://a.com/2")
        .start_url("https://a.com/3")
        .start_url("https://a.com/4")
        .paginate(false)
        .max_concurrent_runs(2)
        .build()
        .unwrap();
    let handler = Arc::new(
        ScriptedHandler::new("a", "a.com")
            .slow(Duration::from_millis(150))
            .dom(Behavior::Items(items("a", 1))),
    );
    let registry = HandlerRegistry::new().with_handler(handler.clone());
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    assert_eq!(report.seeds.len(), 4);
    assert!(handler.peak() <= 2);
    assert!(handler.peak() >= 1);
}

#[tokio::test]
async fn test_cancellation_returns_partial_results() {
    let config = test_config("https://a.com/1")
        .start_url("https://a.com/2")
        .start_url("https://a.com/3")
        .paginate(false)
        .max_concurrent_runs(1)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("a", "a.com")
        .slow(Duration::from_millis(300))
        .dom(Behavior::per_page(vec![("https://a.com/1", items("first", 2))]));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let controller = RunController::new(config, registry, factory).unwrap();
    let token = controller.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    let report = controller.run().await;

    assert!(report.cancelled);
    assert!(report.is_partial());
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.seeds.len(), 3);
    assert_eq!(report.seeds[1].stop_reason, StopReason::Cancelled);
    assert_eq!(report.seeds[2].stop_reason, StopReason::Cancelled);
}

#[tokio::test]
async fn test_run_deadline_stops_slow_seed() {
    init_tracing();
    let config = test_config("https://a.com/slow")
        .paginate(false)
        .run_timeout_secs(1)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("a", "a.com")
        .slow(Duration::from_secs(5))
        .dom(Behavior::Items(items("late", 1)));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    assert!(report.timed_out);
    assert!(report.items.is_empty());
    assert_eq!(report.seeds[0].stop_reason, StopReason::Deadline);
}

#[tokio::test]
async fn test_required_auth_without_credentials_fails_seed() {
    let config = test_config("https://private.com/feed").build().unwrap();
    let handler = ScriptedHandler::new("private", "private.com")
        .requiring_auth()
        .dom(Behavior::Items(items("p", 1)));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    let seed = &report.seeds[0];
    assert_eq!(seed.stop_reason, StopReason::Failed);
    assert!(!seed.authenticated);
    assert_eq!(seed.auth_method, None);
    assert!(report.items.is_empty());
    assert!(!seed.errors.is_empty());
}

#[tokio::test]
async fn test_credentials_from_config_authenticate_seed() {
    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    std::fs::write(
        &credentials,
        r#"{"sites": {"private.com": {"cookies": [{"name": "sid", "value": "42", "domain": ".private.com"}]}}}"#,
    )
    .unwrap();
    let config = test_config("https://www.private.com/feed")
        .paginate(false)
        .credentials_path(&credentials)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("private", "private.com")
        .requiring_auth()
        .dom(Behavior::Items(items("p", 3)));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(
        MockSession::new().with_logged_in_cookie("sid", ".logged-in"),
    ));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    let seed = &report.seeds[0];
    assert!(seed.authenticated);
    assert_eq!(seed.auth_method, Some(AuthMethod::Cookie));
    assert_eq!(report.items.len(), 3);
}

#[tokio::test]
async fn test_unclaimed_seed_uses_generic_handler() {
    let page = "https://b.org/post";
    let config = test_config("https://a.com/one")
        .start_url(page)
        .paginate(false)
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("a", "a.com").dom(Behavior::Items(items("a", 1)));
    let registry = HandlerRegistry::new().with_handler(Arc::new(handler));
    let factory = Arc::new(MockSessionFactory::new(MockSession::new().with_page(
        page,
        r#"<html><head><title>Post</title></head><body><img src="/photo.jpg"></body></html>"#,
    )));

    let report = RunController::new(config, registry, factory).unwrap().run().await;

    assert_eq!(report.seeds[0].handler, "a");
    assert_eq!(report.seeds[1].handler, "generic");
    assert!(report.items.iter().any(|i| i.url == "https://b.org/photo.jpg"));

    let json = report.to_json();
    assert!(json.contains("\"stop_reason\": \"completed\""));
    assert!(json.contains("\"handler\": \"generic\""));
}

#[test]
fn test_missing_credentials_file_is_rejected() {
    let config = test_config("https://a.com/")
        .credentials_path("/definitely/not/here.json")
        .build()
        .unwrap();
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));

    assert!(RunController::new(config, HandlerRegistry::new(), factory).is_err());
}

fn resumable_registry() -> (HandlerRegistry, Arc<ScriptedHandler>, Arc<ScriptedHandler>) {
    let mut second_page = items("p2", 2);
    second_page.extend(items("q", 1));
    let paged = Arc::new(
        ScriptedHandler::new("a", "a.com")
            .paginated(Pagination::Auto)
            .dom(Behavior::per_page(vec![
                ("https://a.com/1", items("p1", 2)),
                ("https://a.com/1?page=2", second_page),
            ])),
    );
    let single = Arc::new(
        ScriptedHandler::new("b", "b.com").dom(Behavior::per_page(vec![("https://b.com/2", items("q", 1))])),
    );
    let registry = HandlerRegistry::new()
        .with_handler(paged.clone())
        .with_handler(single.clone());
    (registry, paged, single)
}

#[tokio::test]
async fn test_resumed_run_continues_from_checkpoint() {
    let config = test_config("https://a.com/1")
        .start_url("https://b.com/2")
        .max_pages(1)
        .build()
        .unwrap();

    let (registry, _, _) = resumable_registry();
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));
    let first = RunController::new(config.clone(), registry, factory).unwrap().run().await;

    assert_eq!(first.items.len(), 3);
    assert_eq!(first.seeds[0].stop_reason, StopReason::PageBudget);
    assert!(first.seeds[0].checkpoint.is_some());
    assert_eq!(first.seeds[1].stop_reason, StopReason::Completed);
    assert!(first.seeds[1].checkpoint.is_none());

    let saved = RunReport::from_json(&first.to_json()).unwrap();
    let (registry, paged, single) = resumable_registry();
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));
    let second = RunController::new(config, registry, factory)
        .unwrap()
        .resume_from(saved)
        .run()
        .await;

    // Finished seed is carried over without being crawled again
    assert!(single.calls().is_empty());
    assert!(second.seeds[1].resumed);
    assert_eq!(second.seeds[1].items_found, 1);

    assert_eq!(paged.calls_for(Strategy::AutomatedDom), vec!["https://a.com/1?page=2".to_string()]);
    assert!(!second.seeds[0].resumed);
    assert_eq!(second.seeds[0].pages_visited, 2);
    assert_eq!(second.seeds[0].items_found, 5);

    let urls: Vec<&str> = second.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/media/p1-0.jpg",
            "https://example.com/media/p1-1.jpg",
            "https://example.com/media/q-0.jpg",
            "https://example.com/media/p2-0.jpg",
            "https://example.com/media/p2-1.jpg",
        ]
    );
    assert_eq!(second.resumed_items, 3);
    assert_eq!(second.duplicates_removed, 1);
}

#[tokio::test]
async fn test_resume_restarts_seed_cancelled_before_crawling() {
    let config = test_config("https://b.com/2").paginate(false).build().unwrap();
    let previous = RunReport::from_json(
        r#"{
            "items": [],
            "seeds": [{
                "url": "https://b.com/2",
                "handler": "b",
                "auth_method": null,
                "authenticated": false,
                "strategy_used": null,
                "pages_visited": 0,
                "items_found": 0,
                "stop_reason": "cancelled",
                "errors": []
            }],
            "total_pages_visited": 0,
            "duplicates_removed": 0,
            "cancelled": true,
            "timed_out": false
        }"#,
    )
    .unwrap();
    assert!(!previous.seeds[0].is_finished());

    let (registry, _, single) = resumable_registry();
    let factory = Arc::new(MockSessionFactory::new(MockSession::new()));
    let report = RunController::new(config, registry, factory)
        .unwrap()
        .resume_from(previous)
        .run()
        .await;

    assert_eq!(single.calls_for(Strategy::AutomatedDom), vec!["https://b.com/2".to_string()]);
    assert_eq!(report.seeds[0].stop_reason, StopReason::Completed);
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.resumed_items, 0);
}

#[test]
fn test_report_load_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("last-run.json");
    std::fs::write(&path, "{ truncated").unwrap();

    let err = RunReport::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("last-run.json"));
}
