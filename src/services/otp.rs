use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const CODE_EXPIRY_MINUTES: i64 = 5;
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Failure modes of the OTP flow. The register/verify routes collapse
/// `InvalidCode` and `Expired` into one user-facing message but log them
/// distinctly.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpError {
    NoSession,
    InvalidCode,
    Expired,
    CooldownActive { remaining_seconds: i64 },
}

#[derive(Debug, Clone)]
struct OtpSession {
    username: String,
    code: String,
    expires_at: DateTime<Utc>,
    cooldown_until: DateTime<Utc>,
    verified: bool,
}

#[derive(Debug)]
pub struct RequestOutcome {
    pub code: String,
    pub is_resend: bool,
}

/// In-memory OTP sessions keyed by email. Sessions are ephemeral: created
/// on registration request, superseded on resend, deleted when the
/// registration completes.
#[derive(Default)]
pub struct OtpStore {
    sessions: Mutex<HashMap<String, OtpSession>>,
}

fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(100_000..=999_999))
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a code for `email`. An existing session is superseded and
    /// reported as a resend instead of creating a duplicate.
    pub fn request(&self, email: &str, username: &str) -> RequestOutcome {
        self.request_at(email, username, Utc::now())
    }

    fn request_at(&self, email: &str, username: &str, now: DateTime<Utc>) -> RequestOutcome {
        let mut sessions = self.sessions.lock().expect("otp store lock poisoned");

        let is_resend = sessions.contains_key(email);
        let code = generate_code();

        sessions.insert(
            email.to_string(),
            OtpSession {
                username: username.to_string(),
                code: code.clone(),
                expires_at: now + Duration::minutes(CODE_EXPIRY_MINUTES),
                cooldown_until: now + Duration::seconds(RESEND_COOLDOWN_SECONDS),
                verified: false,
            },
        );

        RequestOutcome { code, is_resend }
    }

    /// Re-issues a code, honoring the resend cooldown.
    pub fn resend(&self, email: &str) -> Result<String, OtpError> {
        self.resend_at(email, Utc::now())
    }

    fn resend_at(&self, email: &str, now: DateTime<Utc>) -> Result<String, OtpError> {
        let mut sessions = self.sessions.lock().expect("otp store lock poisoned");

        let session = sessions.get_mut(email).ok_or(OtpError::NoSession)?;

        if now < session.cooldown_until {
            return Err(OtpError::CooldownActive {
                remaining_seconds: (session.cooldown_until - now).num_seconds().max(1),
            });
        }

        let code = generate_code();
        session.code = code.clone();
        session.expires_at = now + Duration::minutes(CODE_EXPIRY_MINUTES);
        session.cooldown_until = now + Duration::seconds(RESEND_COOLDOWN_SECONDS);
        session.verified = false;

        Ok(code)
    }

    /// Exact-match, unexpired verification. The session is retained after
    /// success so the verified gate can be re-checked at sign-in.
    pub fn verify(&self, email: &str, code: &str) -> Result<String, OtpError> {
        self.verify_at(email, code, Utc::now())
    }

    fn verify_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<String, OtpError> {
        let mut sessions = self.sessions.lock().expect("otp store lock poisoned");

        let session = sessions.get_mut(email).ok_or(OtpError::NoSession)?;

        if now > session.expires_at {
            sessions.remove(email);
            return Err(OtpError::Expired);
        }

        if session.code != code {
            return Err(OtpError::InvalidCode);
        }

        session.verified = true;
        Ok(session.username.clone())
    }

    pub fn is_verified(&self, email: &str) -> bool {
        self.sessions
            .lock()
            .expect("otp store lock poisoned")
            .get(email)
            .is_some_and(|s| s.verified)
    }

    pub fn username_of(&self, email: &str) -> Option<String> {
        self.sessions
            .lock()
            .expect("otp store lock poisoned")
            .get(email)
            .map(|s| s.username.clone())
    }

    /// Consumes the session once registration has completed. Idempotent: a
    /// second call is a no-op, not an error.
    pub fn complete(&self, email: &str) {
        self.sessions
            .lock()
            .expect("otp store lock poisoned")
            .remove(email);
    }

    /// Seconds until a resend is allowed again, zero when free.
    pub fn resend_countdown(&self, email: &str) -> i64 {
        self.resend_countdown_at(email, Utc::now())
    }

    fn resend_countdown_at(&self, email: &str, now: DateTime<Utc>) -> i64 {
        self.sessions
            .lock()
            .expect("otp store lock poisoned")
            .get(email)
            .map(|s| (s.cooldown_until - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "a@b.com";

    #[test]
    fn request_issues_six_digit_code() {
        let store = OtpStore::new();
        let outcome = store.request(EMAIL, "Tester");

        assert_eq!(outcome.code.len(), 6);
        assert!(outcome.code.chars().all(|c| c.is_ascii_digit()));
        assert!(!outcome.is_resend);
    }

    #[test]
    fn second_request_supersedes_and_reports_resend() {
        let store = OtpStore::new();
        let first = store.request(EMAIL, "Tester");
        let second = store.request(EMAIL, "Tester");

        assert!(second.is_resend);
        // the superseded code no longer verifies (unless identical by chance)
        if first.code != second.code {
            assert_eq!(store.verify(EMAIL, &first.code), Err(OtpError::InvalidCode));
        }
        assert!(store.verify(EMAIL, &second.code).is_ok());
    }

    #[test]
    fn resend_inside_cooldown_is_rejected() {
        let store = OtpStore::new();
        let now = Utc::now();
        store.request_at(EMAIL, "Tester", now);

        let err = store.resend_at(EMAIL, now + Duration::seconds(10)).unwrap_err();
        assert!(matches!(err, OtpError::CooldownActive { remaining_seconds } if remaining_seconds > 0));

        let code = store
            .resend_at(EMAIL, now + Duration::seconds(RESEND_COOLDOWN_SECONDS + 1))
            .unwrap();
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn expired_code_is_rejected_and_session_evicted() {
        let store = OtpStore::new();
        let now = Utc::now();
        let outcome = store.request_at(EMAIL, "Tester", now);

        let late = now + Duration::minutes(CODE_EXPIRY_MINUTES) + Duration::seconds(1);
        assert_eq!(
            store.verify_at(EMAIL, &outcome.code, late),
            Err(OtpError::Expired)
        );
        assert_eq!(
            store.verify_at(EMAIL, &outcome.code, late),
            Err(OtpError::NoSession)
        );
    }

    #[test]
    fn wrong_code_is_rejected_without_consuming_session() {
        let store = OtpStore::new();
        let outcome = store.request(EMAIL, "Tester");

        assert_eq!(store.verify(EMAIL, "000000"), Err(OtpError::InvalidCode));
        assert_eq!(store.verify(EMAIL, &outcome.code).unwrap(), "Tester");
        assert!(store.is_verified(EMAIL));
    }

    #[test]
    fn verified_session_is_retained_until_completion() {
        let store = OtpStore::new();
        let outcome = store.request(EMAIL, "Tester");
        store.verify(EMAIL, &outcome.code).unwrap();

        assert!(store.is_verified(EMAIL));

        store.complete(EMAIL);
        assert!(!store.is_verified(EMAIL));

        // completion is idempotent
        store.complete(EMAIL);
        assert!(!store.is_verified(EMAIL));
    }

    #[test]
    fn countdown_reports_remaining_cooldown() {
        let store = OtpStore::new();
        let now = Utc::now();
        store.request_at(EMAIL, "Tester", now);

        let remaining = store.resend_countdown_at(EMAIL, now + Duration::seconds(20));
        assert!((38..=40).contains(&remaining));

        assert_eq!(
            store.resend_countdown_at(EMAIL, now + Duration::seconds(90)),
            0
        );
        assert_eq!(store.resend_countdown_at("other@b.com", now), 0);
    }
}
