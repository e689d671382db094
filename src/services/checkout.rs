use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::{
    error::{AppError, Result},
    models::{
        BankInfo, CheckoutConfirmResponse, CheckoutStatusResponse, CheckoutStep, PaymentStatus,
    },
    services::payment::PaymentClient,
};

/// Action run exactly once when a payment completes (credential delivery).
pub type CompletionFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type CompletionAction = Box<dyn FnOnce() -> CompletionFuture + Send>;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    /// Hard ceiling after which polling stops regardless of status. A
    /// liveness bound, not a business rule: the session is left in
    /// `payment` with no further updates.
    pub ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            ceiling: Duration::from_secs(30 * 60),
        }
    }
}

/// Cancellable poll task handle. The registry owns it; releasing it on any
/// exit path aborts the task, so no timer outlives its session.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Session {
    product_code: String,
    email: String,
    amount: i64,
    order_code: String,
    qr_code: String,
    bank_info: BankInfo,
    step: CheckoutStep,
    poll: Option<PollHandle>,
}

/// Decrements the live-poll gauge when a poll task ends, including by
/// abort (the future is dropped either way).
struct PollGuard(Arc<AtomicUsize>);

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sessions plus in-flight order-id reservations, guarded by one lock.
/// A reservation is held while the payment backend mints a transaction so
/// a concurrent confirm for the same id is rejected instead of minting a
/// second one.
#[derive(Default)]
struct Registry {
    sessions: HashMap<String, Session>,
    pending: HashSet<String>,
}

struct Inner {
    registry: Mutex<Registry>,
    poll_config: PollConfig,
    active_polls: Arc<AtomicUsize>,
}

/// Registry of in-flight checkout sessions, keyed by the client-generated
/// order id. Holds the only poll handle per session; all transitions happen
/// under one lock, which preserves the at-most-one-active-poll invariant in
/// a multi-threaded runtime. Cheap to clone.
#[derive(Clone)]
pub struct CheckoutSessions {
    inner: Arc<Inner>,
}

impl CheckoutSessions {
    pub fn new(poll_config: PollConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                poll_config,
                active_polls: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Number of live poll tasks, for instrumentation and tests.
    pub fn active_poll_count(&self) -> usize {
        self.inner.active_polls.load(Ordering::SeqCst)
    }

    /// Confirms an order: mints a transaction on the payment backend,
    /// records the session in `payment` state and starts status polling.
    /// On any backend failure nothing is persisted — the caller stays at
    /// the form step.
    pub async fn confirm(
        &self,
        order_id: &str,
        product_code: &str,
        email: &str,
        amount: i64,
        client: &PaymentClient,
        on_complete: CompletionAction,
    ) -> Result<CheckoutConfirmResponse> {
        {
            let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
            if registry.sessions.contains_key(order_id)
                || !registry.pending.insert(order_id.to_string())
            {
                return Err(AppError::Conflict(
                    "Đơn hàng này đang được xử lý".to_string(),
                ));
            }
        }

        // the reservation taken above is held across this await; it must be
        // released on every exit path below
        let transaction = match client
            .create_transaction(order_id, amount, product_code, email)
            .await
        {
            Ok(transaction) => transaction,
            Err(e) => {
                self.inner
                    .registry
                    .lock()
                    .expect("checkout lock poisoned")
                    .pending
                    .remove(order_id);
                return Err(e);
            }
        };

        {
            let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
            registry.pending.remove(order_id);
            registry.sessions.insert(
                order_id.to_string(),
                Session {
                    product_code: product_code.to_string(),
                    email: email.to_string(),
                    amount,
                    order_code: transaction.order_code.clone(),
                    qr_code: transaction.qr_code.clone(),
                    bank_info: transaction.bank_info.clone(),
                    step: CheckoutStep::Payment,
                    poll: None,
                },
            );
        }

        tracing::info!(
            "Checkout confirmed: order_id={}, order_code={}, amount={}",
            order_id,
            transaction.order_code,
            amount
        );

        self.start_polling(order_id, &transaction.order_code, client.clone(), on_complete);

        Ok(CheckoutConfirmResponse {
            order_id: order_id.to_string(),
            order_code: transaction.order_code,
            qr_code: transaction.qr_code,
            bank_info: transaction.bank_info,
        })
    }

    /// Starts the status poll for a confirmed session. Any prior poll for
    /// the same order is aborted under the registry lock before the new
    /// handle is stored, so two timers can never run concurrently.
    ///
    /// Ticks are strictly sequential: the loop awaits each status response
    /// before the next tick, so a slow backend cannot produce overlapping
    /// reads or duplicate completion notifications.
    pub fn start_polling(
        &self,
        order_id: &str,
        order_code: &str,
        client: PaymentClient,
        on_complete: CompletionAction,
    ) {
        let tracker = self.clone();
        let oid = order_id.to_string();
        let code = order_code.to_string();
        let poll_config = self.inner.poll_config;

        self.inner.active_polls.fetch_add(1, Ordering::SeqCst);
        let guard = PollGuard(Arc::clone(&self.inner.active_polls));

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut on_complete = Some(on_complete);
            let started = Instant::now();

            let mut ticker = interval(poll_config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval's first tick fires immediately; consume it so the
            // first status read happens one interval after confirmation.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if started.elapsed() >= poll_config.ceiling {
                    tracing::warn!(
                        "Payment polling ceiling reached for order {}, stopping",
                        oid
                    );
                    tracker.clear_poll(&oid);
                    break;
                }

                match client.fetch_status(&code).await {
                    Ok(PaymentStatus::Completed) => {
                        if tracker.mark_success(&oid) {
                            tracing::info!("Payment completed for order {}", oid);
                            if let Some(notify) = on_complete.take() {
                                notify().await;
                            }
                        }
                        tracker.clear_poll(&oid);
                        break;
                    }
                    Ok(PaymentStatus::Pending) => {}
                    Err(e) => {
                        // transient failure: the next scheduled tick retries
                        tracing::warn!("Payment status check failed for order {}: {}", oid, e);
                    }
                }
            }
        });

        let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
        match registry.sessions.get_mut(order_id) {
            Some(session) => {
                if let Some(previous) = session.poll.replace(PollHandle { handle }) {
                    tracing::warn!("Replacing active poll for order {}", order_id);
                    previous.cancel();
                }
            }
            None => handle.abort(),
        }
    }

    /// Transitions a session to `success`. Returns true only for the first
    /// transition, so completion side effects run exactly once.
    fn mark_success(&self, order_id: &str) -> bool {
        let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
        match registry.sessions.get_mut(order_id) {
            Some(session) if session.step != CheckoutStep::Success => {
                session.step = CheckoutStep::Success;
                true
            }
            _ => false,
        }
    }

    fn clear_poll(&self, order_id: &str) {
        let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
        if let Some(session) = registry.sessions.get_mut(order_id) {
            // dropping the handle aborts the task; harmless when the task
            // is the one finishing
            session.poll = None;
        }
    }

    pub fn status(&self, order_id: &str) -> Option<CheckoutStatusResponse> {
        let registry = self.inner.registry.lock().expect("checkout lock poisoned");
        registry.sessions.get(order_id).map(|session| CheckoutStatusResponse {
            payment_step: session.step,
            payment_status: if session.step == CheckoutStep::Success {
                PaymentStatus::Completed
            } else {
                PaymentStatus::Pending
            },
        })
    }

    pub fn has_active_poll(&self, order_id: &str) -> bool {
        let registry = self.inner.registry.lock().expect("checkout lock poisoned");
        registry
            .sessions
            .get(order_id)
            .and_then(|s| s.poll.as_ref())
            .is_some_and(|p| !p.is_finished())
    }

    pub fn order_code_of(&self, order_id: &str) -> Option<String> {
        let registry = self.inner.registry.lock().expect("checkout lock poisoned");
        registry.sessions.get(order_id).map(|s| s.order_code.clone())
    }

    pub fn buyer_of(&self, order_id: &str) -> Option<(String, String, i64)> {
        let registry = self.inner.registry.lock().expect("checkout lock poisoned");
        registry
            .sessions
            .get(order_id)
            .map(|s| (s.email.clone(), s.product_code.clone(), s.amount))
    }

    /// Tears a session down, releasing its poll handle. Used on navigation
    /// away and on every error exit path.
    pub fn cancel(&self, order_id: &str) -> bool {
        let mut registry = self.inner.registry.lock().expect("checkout lock poisoned");
        registry.sessions.remove(order_id).is_some()
    }
}

impl Default for CheckoutSessions {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}
