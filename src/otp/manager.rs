use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::OtpConfig;
use crate::notify::{code_message, Notifier};

use super::code::generate_code;
use super::error::{OtpError, OtpResult};
use super::locks::KeyedLocks;
use super::record::{OtpRecord, PendingSignup};
use super::store::OtpStore;

/// Whether the notifier accepted the message. A failed send never rolls
/// back the stored code; callers surface it so the user can ask again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Sent,
    Failed,
}

/// What the caller learns from an issue or resend. The code itself stays
/// out of the receipt unless `expose_codes` is switched on.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReceipt {
    pub identifier: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub delivery: Delivery,
    pub debug_code: Option<String>,
}

/// Issues, verifies, and retires one-time codes.
///
/// All store access for a given identifier runs under that identifier's
/// mutex, so attempt counting and replace-on-reissue hold even when the
/// same phone number is hammered concurrently. Notifier I/O happens after
/// the lock is released.
#[derive(Clone)]
pub struct OtpManager {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: OtpConfig,
    locks: Arc<KeyedLocks>,
}

impl OtpManager {
    pub fn new(
        store: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: OtpConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Stores a fresh code for `identifier` and dispatches it. Any code
    /// already outstanding for the identifier is replaced wholesale,
    /// attempt counter included.
    pub async fn issue(&self, identifier: &str, payload: PendingSignup) -> OtpResult<IssueReceipt> {
        let lock = self.locks.handle(identifier).await;
        let record = {
            let _guard = lock.lock().await;
            self.store_fresh(identifier, payload).await?
        };
        Ok(self.dispatch(record).await)
    }

    /// Rotates the code for an identifier that already has a pending
    /// record, reusing its payload. Works on an expired record too, as
    /// long as the sweeper has not evicted it yet.
    pub async fn resend(&self, identifier: &str) -> OtpResult<IssueReceipt> {
        let lock = self.locks.handle(identifier).await;
        let record = {
            let _guard = lock.lock().await;
            let existing = self
                .store
                .get(identifier)
                .await
                .map_err(OtpError::Store)?
                .ok_or(OtpError::NotFound)?;
            self.store_fresh(identifier, existing.payload).await?
        };
        Ok(self.dispatch(record).await)
    }

    /// Checks `supplied` against the outstanding code and, on success,
    /// consumes the record and hands back its payload.
    ///
    /// Checks run in a fixed order: record existence, then the attempt
    /// ceiling (counting this call), then expiry, then the code itself.
    /// The call that exceeds the ceiling invalidates the record even if
    /// it carried the right code.
    pub async fn verify(&self, identifier: &str, supplied: &str) -> OtpResult<PendingSignup> {
        let lock = self.locks.handle(identifier).await;
        let _guard = lock.lock().await;

        let mut record = match self.store.get(identifier).await.map_err(OtpError::Store)? {
            Some(record) => record,
            None => return Err(OtpError::NotFound),
        };

        record.attempts += 1;
        if record.attempts > self.config.max_attempts {
            self.store.remove(identifier).await.map_err(OtpError::Store)?;
            tracing::warn!(%identifier, attempts = record.attempts, "attempt ceiling hit; code invalidated");
            return Err(OtpError::TooManyAttempts);
        }

        if record.is_expired(self.clock.now()) {
            self.store.remove(identifier).await.map_err(OtpError::Store)?;
            return Err(OtpError::Expired);
        }

        if record.code != supplied {
            self.store.put(record).await.map_err(OtpError::Store)?;
            return Err(OtpError::Mismatch);
        }

        match self.store.remove(identifier).await.map_err(OtpError::Store)? {
            Some(consumed) => {
                tracing::info!(%identifier, "code verified");
                Ok(consumed.payload)
            }
            None => Err(OtpError::NotFound),
        }
    }

    /// Background task that evicts expired records every `period` and
    /// trims the lock registry. Abort the returned handle on shutdown.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let locks = Arc::clone(&self.locks);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired(clock.now()).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "expired verification codes swept"),
                    Err(error) => tracing::warn!(%error, "sweep failed; will retry next tick"),
                }
                locks.compact().await;
            }
        })
    }

    // Caller must hold the identifier's lock.
    async fn store_fresh(&self, identifier: &str, payload: PendingSignup) -> OtpResult<OtpRecord> {
        let now = self.clock.now();
        let record = OtpRecord {
            identifier: identifier.to_string(),
            code: generate_code(),
            issued_at: now,
            expires_at: now + self.config.ttl(),
            attempts: 0,
            payload,
        };
        self.store
            .put(record.clone())
            .await
            .map_err(OtpError::Store)?;
        Ok(record)
    }

    async fn dispatch(&self, record: OtpRecord) -> IssueReceipt {
        let message = code_message(&record.code, self.config.ttl_minutes);
        let delivery = match self.notifier.send(&record.identifier, &message).await {
            Ok(()) => {
                tracing::info!(identifier = %record.identifier, "verification code dispatched");
                Delivery::Sent
            }
            Err(error) => {
                tracing::warn!(
                    identifier = %record.identifier,
                    %error,
                    "code dispatch failed; stored code remains valid"
                );
                Delivery::Failed
            }
        };
        let debug_code = self.config.expose_codes.then(|| record.code.clone());
        IssueReceipt {
            identifier: record.identifier,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            delivery,
            debug_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::clock::ManualClock;
    use crate::notify::test_support::{FailingNotifier, RecordingNotifier};
    use crate::otp::store::InMemoryOtpStore;
    use time::macros::datetime;

    const PHONE: &str = "+15550001111";

    fn payload() -> PendingSignup {
        PendingSignup {
            username: "ada".into(),
            email: "ada@example.com".into(),
            phone: PHONE.into(),
            role: Role::Attendee,
            password_hash: "$argon2id$stub".into(),
        }
    }

    fn exposing_config() -> OtpConfig {
        OtpConfig {
            expose_codes: true,
            ..OtpConfig::default()
        }
    }

    fn manager_on(
        store: InMemoryOtpStore,
        notifier: Arc<dyn Notifier>,
    ) -> (OtpManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let manager = OtpManager::new(Arc::new(store), notifier, clock.clone(), exposing_config());
        (manager, clock)
    }

    fn manager() -> (OtpManager, Arc<ManualClock>) {
        manager_on(
            InMemoryOtpStore::new(),
            Arc::new(RecordingNotifier::default()),
        )
    }

    #[tokio::test]
    async fn issue_then_verify_consumes_the_code() {
        let (manager, _) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();

        let pending = manager.verify(PHONE, &code).await.unwrap();
        assert_eq!(pending, payload());

        // Consumed on success; a replay finds nothing.
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn wrong_code_counts_but_keeps_the_record() {
        let (manager, _) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();

        assert!(matches!(
            manager.verify(PHONE, "000000").await,
            Err(OtpError::Mismatch)
        ));
        assert!(manager.verify(PHONE, &code).await.is_ok());
    }

    #[tokio::test]
    async fn sixth_attempt_invalidates_even_with_the_right_code() {
        let (manager, _) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..5 {
            assert!(matches!(
                manager.verify(PHONE, wrong).await,
                Err(OtpError::Mismatch)
            ));
        }
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::TooManyAttempts)
        ));
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn expired_code_rejected_then_gone() {
        let (manager, clock) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();

        clock.advance(time::Duration::minutes(5) + time::Duration::seconds(1));
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::Expired)
        ));
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn code_still_good_at_the_expiry_instant() {
        let (manager, clock) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();

        clock.advance(time::Duration::minutes(5));
        assert!(manager.verify(PHONE, &code).await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_counter_reported_before_expiry() {
        let (manager, clock) = manager();
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = receipt.debug_code.unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..5 {
            let _ = manager.verify(PHONE, wrong).await;
        }
        clock.advance(time::Duration::hours(1));
        assert!(matches!(
            manager.verify(PHONE, &code).await,
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn reissue_replaces_code_and_resets_the_counter() {
        let (manager, _) = manager();
        let first = manager.issue(PHONE, payload()).await.unwrap();
        let old_code = first.debug_code.unwrap();
        let wrong = if old_code == "000000" { "000001" } else { "000000" };

        for _ in 0..4 {
            let _ = manager.verify(PHONE, wrong).await;
        }

        let second = manager.issue(PHONE, payload()).await.unwrap();
        let new_code = second.debug_code.unwrap();

        // A carried-over counter would trip the ceiling during these
        // calls; a fresh one leaves the fifth attempt for the match.
        for _ in 0..3 {
            assert!(matches!(
                manager.verify(PHONE, wrong).await,
                Err(OtpError::Mismatch)
            ));
        }
        assert!(matches!(
            manager.verify(PHONE, &old_code).await,
            Err(OtpError::Mismatch)
        ));
        assert!(manager.verify(PHONE, &new_code).await.is_ok());
    }

    #[tokio::test]
    async fn delivery_failure_leaves_code_usable() {
        let (manager, _) = manager_on(InMemoryOtpStore::new(), Arc::new(FailingNotifier));
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        assert_eq!(receipt.delivery, Delivery::Failed);

        let code = receipt.debug_code.unwrap();
        assert!(manager.verify(PHONE, &code).await.is_ok());
    }

    #[tokio::test]
    async fn debug_code_hidden_unless_configured() {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
        let manager = OtpManager::new(
            Arc::new(InMemoryOtpStore::new()),
            notifier.clone(),
            clock,
            OtpConfig::default(),
        );

        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        assert!(receipt.debug_code.is_none());
        assert_eq!(receipt.delivery, Delivery::Sent);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PHONE);
        assert!(sent[0].1.contains("verification code"));
    }

    #[tokio::test]
    async fn verify_without_issue_reports_not_found() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.verify(PHONE, "123456").await,
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn resend_requires_a_pending_record() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.resend(PHONE).await,
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn resend_rotates_code_and_keeps_payload() {
        let (manager, clock) = manager();
        let first = manager.issue(PHONE, payload()).await.unwrap();

        clock.advance(time::Duration::minutes(2));
        let second = manager.resend(PHONE).await.unwrap();
        assert_eq!(
            second.expires_at - first.expires_at,
            time::Duration::minutes(2)
        );

        let pending = manager
            .verify(PHONE, &second.debug_code.unwrap())
            .await
            .unwrap();
        assert_eq!(pending, payload());
    }

    #[tokio::test]
    async fn resend_revives_an_expired_unswept_record() {
        let (manager, clock) = manager();
        manager.issue(PHONE, payload()).await.unwrap();

        clock.advance(time::Duration::minutes(10));
        let receipt = manager.resend(PHONE).await.unwrap();
        assert!(manager
            .verify(PHONE, &receipt.debug_code.unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn concurrent_wrong_guesses_respect_the_ceiling() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        manager.issue(PHONE, payload()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.verify(PHONE, "not-a-code").await
            }));
        }

        let (mut mismatches, mut ceilings, mut missing) = (0, 0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Err(OtpError::Mismatch) => mismatches += 1,
                Err(OtpError::TooManyAttempts) => ceilings += 1,
                Err(OtpError::NotFound) => missing += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(mismatches, 5);
        assert_eq!(ceilings, 1);
        assert_eq!(missing, 4);
    }

    #[tokio::test]
    async fn racing_correct_verifies_consume_exactly_once() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let receipt = manager.issue(PHONE, payload()).await.unwrap();
        let code = Arc::new(receipt.debug_code.unwrap());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let manager = manager.clone();
            let code = code.clone();
            handles.push(tokio::spawn(
                async move { manager.verify(PHONE, &code).await },
            ));
        }

        let (mut succeeded, mut missing) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(OtpError::NotFound) => missing += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(missing, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_codes() {
        let store = InMemoryOtpStore::new();
        let (manager, clock) = manager_on(store.clone(), Arc::new(RecordingNotifier::default()));
        manager.issue(PHONE, payload()).await.unwrap();

        clock.advance(time::Duration::minutes(10));
        let handle = manager.spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(store.get(PHONE).await.unwrap().is_none());
        assert!(matches!(
            manager.resend(PHONE).await,
            Err(OtpError::NotFound)
        ));
        handle.abort();
    }
}
