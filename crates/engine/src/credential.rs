//! Bearer credential holder and expiry monitor.
//!
//! The ranking provider authenticates with a JWT. The monitor reads the
//! token's `exp` claim (the signature is never verified; the token is opaque
//! to us beyond its claims) and raises a single warning once the expiry comes
//! within the threshold. The warning is debounced until the token is rotated
//! to one that expires beyond the threshold.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, info, warn};
use serde::Deserialize;

/// Default number of days before expiry at which the warning fires.
const DEFAULT_THRESHOLD_DAYS: i64 = 30;

/// Default interval between checks.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_RENEWAL_HINT: &str =
    "Generate a new API key in the ranking provider's account settings and set NW_RANKING_API_TOKEN";

/// Shared, rotatable bearer token.
#[derive(Clone)]
pub struct CredentialStore {
    token: Arc<RwLock<String>>,
}

impl CredentialStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token.into())),
        }
    }

    pub fn current(&self) -> String {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, token: impl Into<String>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current().trim().is_empty()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialStore(<redacted>)")
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT without verifying its signature.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    // The key is never consulted once signature validation is off.
    let data = decode::<ExpiryClaims>(token.trim(), &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| format!("invalid token: {}", e))?;
    let exp = data.claims.exp;

    DateTime::<Utc>::from_timestamp(exp, 0).ok_or_else(|| format!("exp claim out of range: {}", exp))
}

#[derive(Clone, Debug, PartialEq)]
pub struct CredentialMonitorConfig {
    /// Warn when the token expires within this many days.
    pub threshold_days: i64,
    /// Time between checks.
    pub check_interval: Duration,
    /// Renewal instructions included in the warning.
    pub renewal_hint: String,
}

impl Default for CredentialMonitorConfig {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            check_interval: DEFAULT_CHECK_INTERVAL,
            renewal_hint: DEFAULT_RENEWAL_HINT.to_string(),
        }
    }
}

/// Result of one monitor tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialCheck {
    /// The token could not be decoded; no state change.
    Undecodable(String),
    /// The token expires today; notification suppressed for this tick.
    ExpiresToday,
    /// Warning emitted; state moved to notified.
    Warned { days_left: i64 },
    /// Within the threshold but already notified.
    AlreadyNotified { days_left: i64 },
    /// Beyond the threshold; state is (or was reset to) unnotified.
    Healthy { days_left: i64 },
}

/// Debounced expiry warning state machine.
pub struct CredentialMonitor {
    credential: CredentialStore,
    config: CredentialMonitorConfig,
    notified: Mutex<bool>,
    last_check: Mutex<Option<CredentialCheck>>,
}

impl CredentialMonitor {
    pub fn new(credential: CredentialStore, config: CredentialMonitorConfig) -> Self {
        Self {
            credential,
            config,
            notified: Mutex::new(false),
            last_check: Mutex::new(None),
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.config.check_interval
    }

    pub fn is_notified(&self) -> bool {
        match self.notified.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Outcome of the most recent check, if any has run.
    pub fn last_check(&self) -> Option<CredentialCheck> {
        match self.last_check.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Run one check against the current token at `now`.
    pub fn check(&self, now: DateTime<Utc>) -> CredentialCheck {
        let result = self.evaluate(now);
        *self.last_check.lock().unwrap_or_else(|p| p.into_inner()) = Some(result.clone());
        result
    }

    fn evaluate(&self, now: DateTime<Utc>) -> CredentialCheck {
        let expiry = match decode_expiry(&self.credential.current()) {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!("Credential monitor: could not decode token expiry: {}", e);
                return CredentialCheck::Undecodable(e);
            }
        };

        if expiry.date_naive() == now.date_naive() {
            debug!("Credential monitor: token expires today, skipping notification");
            return CredentialCheck::ExpiresToday;
        }

        let days_left = (expiry - now).num_hours().div_euclid(24);
        let mut notified = self.notified.lock().unwrap_or_else(|p| p.into_inner());

        if days_left <= self.config.threshold_days {
            if *notified {
                return CredentialCheck::AlreadyNotified { days_left };
            }
            warn!(
                "Ranking API token expires in {} days (on {}). {}",
                days_left,
                expiry.format("%Y-%m-%d"),
                self.config.renewal_hint
            );
            *notified = true;
            CredentialCheck::Warned { days_left }
        } else {
            if *notified {
                info!(
                    "Ranking API token now expires in {} days, expiry warning reset",
                    days_left
                );
            }
            *notified = false;
            CredentialCheck::Healthy { days_left }
        }
    }
}
