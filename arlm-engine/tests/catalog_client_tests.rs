//! Catalog client retry, classification and cancellation behavior
//!
//! Timing assertions run under a paused tokio clock, so backoff sleeps
//! complete instantly while `Instant` still reflects the virtual delays.

mod helpers;

use arlm_engine::services::{CatalogClient, CatalogError, RetryPolicy};
use helpers::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOLERANCE: Duration = Duration::from_millis(5);

fn gaps(times: &[tokio::time::Instant]) -> Vec<Duration> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn assert_gaps(actual: &[Duration], expected: &[Duration]) {
    assert_eq!(actual.len(), expected.len(), "gaps: {actual:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            *a >= *e && *a <= *e + TOLERANCE,
            "gap {a:?} not within tolerance of {e:?} (all: {actual:?})"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_landmarks_decodes_all_records() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::ok(standard_landmarks_body())]);
    let client = scripted_client(transport.clone());

    let landmarks = client.fetch_landmarks(&CancellationToken::new()).await.unwrap();

    assert_eq!(landmarks.len(), 3);
    let mut ids: Vec<_> = landmarks.iter().map(|l| l.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(landmarks[0].category.as_ref().map(|c| c.name.as_str()), Some("Kultur"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].query,
        "select=*,category:categories(*)&is_active=eq.true&order=name.asc"
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_then_success() {
    let transport = ScriptedTransport::new();
    transport.script(
        "landmarks",
        vec![
            Reply::status(429),
            Reply::status(429),
            Reply::ok(standard_landmarks_body()),
        ],
    );
    let client = scripted_client(transport.clone());

    let started = tokio::time::Instant::now();
    let landmarks = client.fetch_landmarks(&CancellationToken::new()).await.unwrap();

    assert_eq!(landmarks.len(), 3);
    assert_eq!(transport.calls("landmarks"), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_gaps(
        &gaps(&transport.call_times("landmarks")),
        &[Duration::from_secs(1), Duration::from_secs(2)],
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhausts_after_three_attempts() {
    let transport = ScriptedTransport::new();
    transport.script("categories", vec![Reply::status(429)]);
    let client = scripted_client(transport.clone());

    let result = client.fetch_categories(&CancellationToken::new()).await;

    assert_eq!(result, Err(CatalogError::RateLimited));
    assert_eq!(transport.calls("categories"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_with_four_attempts_waits_one_two_four() {
    let transport = ScriptedTransport::new();
    transport.script("categories", vec![Reply::status(429)]);
    let client = CatalogClient::new(
        transport.clone(),
        RetryPolicy {
            max_attempts: 4,
            ..RetryPolicy::default()
        },
    );

    let result = client.fetch_categories(&CancellationToken::new()).await;

    assert_eq!(result, Err(CatalogError::RateLimited));
    assert_gaps(
        &gaps(&transport.call_times("categories")),
        &[Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)],
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_back_off_from_half_second() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::status(503)]);
    let client = CatalogClient::new(
        transport.clone(),
        RetryPolicy {
            max_attempts: 4,
            ..RetryPolicy::default()
        },
    );

    let result = client.fetch_landmarks(&CancellationToken::new()).await;

    assert_eq!(result.unwrap_err(), CatalogError::Server { status: 503 });
    assert_gaps(
        &gaps(&transport.call_times("landmarks")),
        &[
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(2),
        ],
    );
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_retry_after_fixed_delay() {
    let transport = ScriptedTransport::new();
    transport.script(
        "landmarks",
        vec![
            Reply::network("connection reset"),
            Reply::network("connection reset"),
            Reply::ok("[]"),
        ],
    );
    let client = scripted_client(transport.clone());

    let landmarks = client.fetch_landmarks(&CancellationToken::new()).await.unwrap();

    assert!(landmarks.is_empty());
    assert_gaps(
        &gaps(&transport.call_times("landmarks")),
        &[Duration::from_millis(500), Duration::from_millis(500)],
    );
}

#[tokio::test(start_paused = true)]
async fn test_last_error_surfaces_after_mixed_failures() {
    let transport = ScriptedTransport::new();
    transport.script(
        "landmarks",
        vec![Reply::status(502), Reply::network("timeout"), Reply::status(429)],
    );
    let client = scripted_client(transport.clone());

    let result = client.fetch_landmarks(&CancellationToken::new()).await;

    assert_eq!(result.unwrap_err(), CatalogError::RateLimited);
    assert_eq!(transport.calls("landmarks"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_statuses_make_exactly_one_request() {
    for (status, expected) in [
        (401, CatalogError::Auth { status: 401 }),
        (403, CatalogError::Auth { status: 403 }),
        (404, CatalogError::NotFound("landmarks".to_string())),
        (400, CatalogError::Http { status: 400 }),
    ] {
        let transport = ScriptedTransport::new();
        transport.script("landmarks", vec![Reply::status(status), Reply::ok("[]")]);
        let client = scripted_client(transport.clone());

        let started = tokio::time::Instant::now();
        let result = client.fetch_landmarks(&CancellationToken::new()).await;

        assert_eq!(result.unwrap_err(), expected, "status {status}");
        assert_eq!(transport.calls("landmarks"), 1, "status {status}");
        assert_eq!(started.elapsed(), Duration::ZERO, "status {status}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_decode_error_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::ok(r#"[{"id": "x"}]"#)]);
    let client = scripted_client(transport.clone());

    let result = client.fetch_landmarks(&CancellationToken::new()).await;

    assert!(matches!(result, Err(CatalogError::Decode(_))));
    assert_eq!(transport.calls("landmarks"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::status(429)]);
    let client = scripted_client(transport.clone());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        })
    };

    let started = tokio::time::Instant::now();
    let result = client.fetch_landmarks(&cancel).await;
    canceller.await.unwrap();

    assert_eq!(result, Err(CatalogError::Cancelled));
    assert_eq!(transport.calls("landmarks"), 1);
    assert!(started.elapsed() < Duration::from_secs(1));

    // No late attempt after the backoff would have elapsed
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls("landmarks"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_request_wins() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::Hang]);
    let client = scripted_client(transport.clone());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        })
    };

    let result = client.fetch_landmarks(&cancel).await;
    canceller.await.unwrap();

    assert_eq!(result, Err(CatalogError::Cancelled));
    assert_eq!(transport.calls("landmarks"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_makes_no_request() {
    let transport = ScriptedTransport::new();
    let client = scripted_client(transport.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client.fetch_categories(&cancel).await;

    assert_eq!(result, Err(CatalogError::Cancelled));
    assert!(transport.requests().is_empty());
    assert_eq!(result.unwrap_err().user_message(), None);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_photos_builds_filtered_query() {
    let transport = ScriptedTransport::new();
    transport.script("landmark_photos", vec![Reply::ok(photos_body(OPERNHAUS_ID))]);
    let client = scripted_client(transport.clone());

    let photos = client
        .fetch_photos(OPERNHAUS_ID, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(photos.len(), 2);
    assert!(photos[0].is_primary);
    assert_eq!(
        transport.requests()[0].query,
        format!("select=*&landmark_id=eq.{OPERNHAUS_ID}&order=sort_order.asc")
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_photos_rejects_query_injection() {
    let transport = ScriptedTransport::new();
    let client = scripted_client(transport.clone());

    let result = client
        .fetch_photos("abc&select=secret", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(CatalogError::InvalidRequest(_))));
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_snapshot_combines_both_collections() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::ok(standard_landmarks_body())]);
    transport.script("categories", vec![Reply::ok(standard_categories_body())]);
    let client = scripted_client(transport.clone());

    let snapshot = client.fetch_snapshot(&CancellationToken::new()).await.unwrap();

    assert_eq!(snapshot.len(), 3);
    let category_ids: Vec<_> = snapshot.categories().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(category_ids, vec!["culture", "squares"]);
    assert!(snapshot.get(OPERNHAUS_ID).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_snapshot_fails_when_either_side_fails() {
    let transport = ScriptedTransport::new();
    transport.script("landmarks", vec![Reply::ok(standard_landmarks_body())]);
    transport.script("categories", vec![Reply::status(401)]);
    let client = scripted_client(transport.clone());

    let result = client.fetch_snapshot(&CancellationToken::new()).await;

    assert_eq!(result.unwrap_err(), CatalogError::Auth { status: 401 });
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_and_invalid_records_dropped_from_snapshot() {
    let transport = ScriptedTransport::new();
    transport.script(
        "landmarks",
        vec![Reply::ok(body(&[
            landmark_json(NEAR_ID, "First", ORIGIN_LAT, ORIGIN_LON, None),
            landmark_json(NEAR_ID, "Second", ORIGIN_LAT, ORIGIN_LON, None),
            landmark_json(FAR_ID, "Broken", 95.0, ORIGIN_LON, None),
        ]))],
    );
    let client = scripted_client(transport.clone());

    let snapshot = client.fetch_snapshot(&CancellationToken::new()).await.unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get(NEAR_ID).unwrap().name, "First");
}
