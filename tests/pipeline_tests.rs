mod common;

use common::{Behavior, MockSession, ScriptedHandler, context, create_html_mock, create_test_html, items, pipeline, test_config};
use kodegen_tools_mediascrape::pipeline::AttemptOutcome;
use kodegen_tools_mediascrape::{
    AuthMethod, AuthResult, CancellationToken, ExtractError, ExtractionContext, MediaItem,
    PipelineState, RunGuard, RunLog, Strategy,
};

const PAGE: &str = "https://example.com/album/7";

#[tokio::test]
async fn test_falls_back_from_empty_api_to_dom() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com")
        .api(Behavior::Empty)
        .dom(Behavior::Items(items("a", 2)));
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.strategy_used, Some(Strategy::AutomatedDom));
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::Empty);
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::Items { count: 2 });
    assert!(report.page_loaded);
    assert_eq!(session.navigations(), vec![PAGE.to_string()]);
}

#[tokio::test]
async fn test_first_productive_strategy_wins() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com")
        .api(Behavior::Items(items("api", 1)))
        .dom(Behavior::Items(items("dom", 5)))
        .html(Behavior::Items(items("html", 5)));
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.strategy_used, Some(Strategy::Api));
    assert_eq!(report.items.len(), 1);
    assert_eq!(handler.calls().len(), 1);
    assert!(session.navigations().is_empty());
}

#[tokio::test]
async fn test_required_api_failure_fails_pipeline() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("api", "example.com").api_only(Behavior::Empty);
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert!(report.is_failed());
    assert!(report.items.is_empty());
    assert!(report.error.unwrap().contains("API"));
    assert_eq!(handler.calls().len(), 1);
    assert!(session.navigations().is_empty());
}

#[tokio::test]
async fn test_strategy_error_falls_through_to_static_html() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com")
        .dom(Behavior::Fail("selector drift".to_string()))
        .html(Behavior::DocumentImages);
    let session = MockSession::new().with_page(
        PAGE,
        &create_test_html("Album", r#"<img src="/media/cover.jpg">"#),
    );
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.strategy_used, Some(Strategy::StaticHtml));
    assert_eq!(report.items[0].url, "https://example.com/media/cover.jpg");
    assert!(matches!(
        &report.attempts[1].outcome,
        AttemptOutcome::Error { kind, .. } if kind == "strategy_error"
    ));
    // Static extraction reuses the loaded page instead of navigating again
    assert_eq!(session.navigations().len(), 1);
    assert_eq!(ctx.page_meta.title.as_deref(), Some("Album"));
}

#[tokio::test]
async fn test_timeout_aborts_pipeline() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com")
        .dom(Behavior::Timeout)
        .html(Behavior::Items(items("html", 1)));
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let result = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await;

    assert!(matches!(result, Err(ExtractError::OperationTimeout { .. })));
    assert!(handler.calls_for(Strategy::StaticHtml).is_empty());
}

#[tokio::test]
async fn test_cancelled_guard_stops_before_any_strategy() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com").dom(Behavior::Items(items("a", 1)));
    let token = CancellationToken::new();
    token.cancel();
    let mut ctx = ExtractionContext::new(PAGE, RunGuard::unbounded(token), RunLog::new());

    let result = pipeline(&config).run(&handler, None, &mut ctx, None).await;

    assert!(matches!(result, Err(ExtractError::Cancelled)));
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn test_required_auth_is_enforced() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("private", "example.com")
        .requiring_auth()
        .dom(Behavior::Items(items("a", 1)));
    let session = MockSession::new();

    let mut ctx = context(PAGE);
    let denied = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, Some(&AuthResult::failed()))
        .await
        .unwrap();
    assert!(denied.is_failed());
    assert!(handler.calls().is_empty());

    let mut ctx = context(PAGE);
    let allowed = pipeline(&config)
        .run(
            &handler,
            Some(&session),
            &mut ctx,
            Some(&AuthResult::ok(AuthMethod::CookieOptimistic)),
        )
        .await
        .unwrap();
    assert_eq!(allowed.items.len(), 1);
}

#[tokio::test]
async fn test_static_html_over_http_without_session() {
    let mut server = mockito::Server::new_async().await;
    let html = create_test_html(
        "Harbour at dusk",
        r#"<meta name="author" content="J. Doe"><img src="/photos/harbour.jpg"><img src="https://other.org/ad.jpg">"#,
    );
    let _page = create_html_mock(&mut server, "/post/1", &html).await;
    let url = format!("{}/post/1", server.url());

    let config = test_config(&url).build().unwrap();
    let handler = ScriptedHandler::new("blog", "*").html(Behavior::DocumentImages);
    let mut ctx = context(&url);

    let report = pipeline(&config).run(&handler, None, &mut ctx, None).await.unwrap();

    assert_eq!(report.strategy_used, Some(Strategy::StaticHtml));
    assert!(!report.page_loaded);
    assert_eq!(report.items.len(), 2);
    let photo = &report.items[0];
    assert_eq!(photo.url, format!("{}/photos/harbour.jpg", server.url()));
    assert_eq!(photo.title.as_deref(), Some("Harbour at dusk"));
    assert_eq!(photo.credits.as_deref(), Some("J. Doe"));
    assert_eq!(photo.request_headers.get("Referer"), Some(&url));
    assert!(photo.request_headers.contains_key("User-Agent"));
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::Skipped);
}

#[tokio::test]
async fn test_same_domain_only_drops_untrusted_hosts() {
    let config = test_config(PAGE).same_domain_only(true).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com")
        .trusting("partner.org")
        .dom(Behavior::Items(vec![
            MediaItem::from_url("https://example.com/media/own.jpg"),
            MediaItem::from_url("https://pics.partner.org/shared.jpg"),
            MediaItem::from_url("https://tracker.evil.org/pixel.jpg"),
            MediaItem::from_url("/media/relative.jpg"),
        ]));
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    let urls: Vec<&str> = report.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/media/own.jpg",
            "https://pics.partner.org/shared.jpg",
            "https://example.com/media/relative.jpg",
        ]
    );
    assert!(!report.items[0].trusted_cdn);
    assert!(report.items[1].trusted_cdn);
}

#[tokio::test]
async fn test_normalization_upgrades_and_dedups() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com").dom(Behavior::Items(vec![
        MediaItem::from_url("https://example.com/media/sunset_400x300.jpg").with_alt("Sunset"),
        MediaItem::from_url("https://example.com/media/sunset_1200x900.jpg?utm_source=feed"),
        MediaItem::from_url("javascript:void(0)"),
    ]));
    let session = MockSession::new();
    let mut ctx = context(PAGE).with_budget(Some(10));

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].url, "https://example.com/media/sunset_1200x900.jpg");
    assert_eq!(report.items[0].title.as_deref(), Some("Sunset"));
}

#[tokio::test]
async fn test_remaining_budget_caps_items() {
    let config = test_config(PAGE).build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com").dom(Behavior::Items(items("a", 8)));
    let session = MockSession::new();
    let mut ctx = context(PAGE).with_budget(Some(3));

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.items.len(), 3);
}

#[tokio::test]
async fn test_size_and_pattern_filters_drop_items() {
    let config = test_config(PAGE)
        .min_dimensions(300, 200)
        .exclude_pattern(r"\.gif$")
        .build()
        .unwrap();
    let handler = ScriptedHandler::new("album", "example.com").dom(Behavior::Items(vec![
        MediaItem::from_url("https://example.com/media/big.jpg").with_dimensions(1024, 768),
        MediaItem::from_url("https://example.com/media/thumb.jpg").with_dimensions(120, 90),
        MediaItem::from_url("https://example.com/media/unknown.jpg"),
        MediaItem::from_url("https://example.com/ads/promo.jpg").with_dimensions(1024, 768),
        MediaItem::from_url("https://example.com/static/Logo.png"),
        MediaItem::from_url("https://example.com/media/loop.GIF"),
    ]));
    let session = MockSession::new();
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&session), &mut ctx, None)
        .await
        .unwrap();

    let urls: Vec<&str> = report.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://example.com/media/big.jpg", "https://example.com/media/unknown.jpg"]
    );
}

#[tokio::test]
async fn test_include_patterns_keep_only_matching_items() {
    let config = test_config(PAGE).include_pattern("/originals/").build().unwrap();
    let handler = ScriptedHandler::new("album", "example.com").dom(Behavior::Items(vec![
        MediaItem::from_url("https://example.com/originals/1.jpg"),
        MediaItem::from_url("https://example.com/previews/1.jpg"),
    ]));
    let mut ctx = context(PAGE);

    let report = pipeline(&config)
        .run(&handler, Some(&MockSession::new()), &mut ctx, None)
        .await
        .unwrap();

    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].url, "https://example.com/originals/1.jpg");
}
