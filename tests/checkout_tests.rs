//! Checkout state machine tests against a throwaway mock payment backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde_json::json;

use accshop_back::error::AppError;
use accshop_back::models::CheckoutStep;
use accshop_back::services::checkout::{CheckoutSessions, CompletionAction, PollConfig};
use accshop_back::services::payment::PaymentClient;

#[derive(Clone, Default)]
struct MockPayment {
    /// status reads answered `pending` before flipping to `completed`
    pending_before_complete: usize,
    status_hits: Arc<AtomicUsize>,
    /// transactions actually minted by the create endpoint
    create_hits: Arc<AtomicUsize>,
    /// artificial latency on create, to widen confirmation races
    create_delay_ms: u64,
    fail_create: bool,
}

async fn mock_create(
    State(mock): State<MockPayment>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    if mock.create_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(mock.create_delay_ms)).await;
    }

    if mock.fail_create {
        return Json(json!({
            "success": false,
            "error": "Transaction rejected",
        }));
    }

    mock.create_hits.fetch_add(1, Ordering::SeqCst);
    let order_id = body["orderId"].as_str().unwrap_or("unknown");
    Json(json!({
        "success": true,
        "data": {
            "orderCode": format!("TX-{}", order_id),
            "qrCode": "data:image/png;base64,AAAA",
            "bankInfo": {
                "bankName": "VCB",
                "accountNumber": "0123456789",
                "accountHolder": "SHOP OWNER",
            },
        },
    }))
}

async fn mock_status(
    State(mock): State<MockPayment>,
    Path(_order_code): Path<String>,
) -> Json<serde_json::Value> {
    let hit = mock.status_hits.fetch_add(1, Ordering::SeqCst);
    let status = if hit < mock.pending_before_complete {
        "pending"
    } else {
        "completed"
    };

    Json(json!({
        "success": true,
        "data": { "status": status },
    }))
}

async fn spawn_mock_backend(mock: MockPayment) -> String {
    let app = Router::new()
        .route("/api/payment/create", post(mock_create))
        .route("/api/payment/status/{order_code}", get(mock_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock backend");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend died");
    });

    format!("http://{}", addr)
}

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(20),
        ceiling: Duration::from_secs(10),
    }
}

fn counting_completion(counter: &Arc<AtomicUsize>) -> CompletionAction {
    let counter = Arc::clone(counter);
    Box::new(move || {
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    })
}

#[tokio::test]
async fn failed_confirmation_persists_nothing() {
    let base_url = spawn_mock_backend(MockPayment {
        fail_create: true,
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    let result = sessions
        .confirm(
            "ORD-FAIL-1",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await;

    assert!(result.is_err());
    assert!(sessions.status("ORD-FAIL-1").is_none());
    assert_eq!(sessions.active_poll_count(), 0);
    assert_eq!(completions.load(Ordering::SeqCst), 0);

    // the order id is free again after the failure: the retry reaches the
    // backend instead of being rejected as a duplicate
    let retry = sessions
        .confirm(
            "ORD-FAIL-1",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await;
    assert!(matches!(retry.unwrap_err(), AppError::ExternalService(_)));
}

#[tokio::test]
async fn concurrent_confirms_mint_a_single_transaction() {
    let create_hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: usize::MAX,
        create_hits: Arc::clone(&create_hits),
        create_delay_ms: 200,
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    let (first, second) = tokio::join!(
        sessions.confirm(
            "ORD-RACE",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        ),
        sessions.confirm(
            "ORD-RACE",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        ),
    );

    // exactly one confirm wins while the backend is still minting; the
    // loser is rejected without reaching the backend at all
    assert_eq!(first.is_ok() as usize + second.is_ok() as usize, 1);
    assert_eq!(create_hits.load(Ordering::SeqCst), 1);

    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser.unwrap_err(), AppError::Conflict(_)));

    assert_eq!(sessions.active_poll_count(), 1);
    assert!(sessions.has_active_poll("ORD-RACE"));
}

#[tokio::test]
async fn pending_then_completed_transitions_exactly_once() {
    let status_hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: 3,
        status_hits: Arc::clone(&status_hits),
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    let response = sessions
        .confirm(
            "ORD-2024-X1",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await
        .expect("confirm failed");

    assert_eq!(response.order_code, "TX-ORD-2024-X1");
    assert_eq!(response.bank_info.bank_name, "VCB");
    assert_eq!(
        sessions.status("ORD-2024-X1").unwrap().payment_step,
        CheckoutStep::Payment
    );

    // wait for the poll loop to see pending three times, then completed
    tokio::time::timeout(Duration::from_secs(5), async {
        while completions.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("payment never completed");

    // let the poll task finish tearing itself down
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        sessions.status("ORD-2024-X1").unwrap().payment_step,
        CheckoutStep::Success
    );
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(status_hits.load(Ordering::SeqCst) >= 4);
    assert!(!sessions.has_active_poll("ORD-2024-X1"));
    assert_eq!(sessions.active_poll_count(), 0);
}

#[tokio::test]
async fn second_poll_replaces_the_first() {
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: usize::MAX,
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    sessions
        .confirm(
            "ORD-DOUBLE",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await
        .expect("confirm failed");

    let order_code = sessions.order_code_of("ORD-DOUBLE").unwrap();
    sessions.start_polling(
        "ORD-DOUBLE",
        &order_code,
        client.clone(),
        counting_completion(&completions),
    );

    // the first task is aborted under the registry lock; only one timer
    // may remain
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sessions.active_poll_count(), 1);
    assert!(sessions.has_active_poll("ORD-DOUBLE"));
}

#[tokio::test]
async fn duplicate_order_id_is_rejected() {
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: usize::MAX,
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    sessions
        .confirm(
            "ORD-DUP",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await
        .expect("confirm failed");

    let second = sessions
        .confirm(
            "ORD-DUP",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await;

    assert!(second.is_err());
    assert_eq!(sessions.active_poll_count(), 1);
}

#[tokio::test]
async fn cancel_releases_the_poll_handle() {
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: usize::MAX,
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(fast_poll());
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    sessions
        .confirm(
            "ORD-CANCEL",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await
        .expect("confirm failed");

    assert!(sessions.cancel("ORD-CANCEL"));
    assert!(sessions.status("ORD-CANCEL").is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sessions.active_poll_count(), 0);

    // cancelling twice is not an error path, it just reports absence
    assert!(!sessions.cancel("ORD-CANCEL"));
}

#[tokio::test]
async fn ceiling_stops_polling_and_leaves_payment_state() {
    let status_hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_mock_backend(MockPayment {
        pending_before_complete: usize::MAX,
        status_hits: Arc::clone(&status_hits),
        ..Default::default()
    })
    .await;

    let sessions = CheckoutSessions::new(PollConfig {
        interval: Duration::from_millis(20),
        ceiling: Duration::from_millis(80),
    });
    let client = PaymentClient::new(base_url);
    let completions = Arc::new(AtomicUsize::new(0));

    sessions
        .confirm(
            "ORD-CEILING",
            "PJSK-001",
            "a@b.com",
            500_000,
            &client,
            counting_completion(&completions),
        )
        .await
        .expect("confirm failed");

    tokio::time::sleep(Duration::from_millis(300)).await;

    // the session is left in payment with no further updates
    assert_eq!(
        sessions.status("ORD-CEILING").unwrap().payment_step,
        CheckoutStep::Payment
    );
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert!(!sessions.has_active_poll("ORD-CEILING"));
    assert_eq!(sessions.active_poll_count(), 0);
}
