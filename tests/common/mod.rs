#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use murmur_core::core::helpers::Clock;
use murmur_core::mailer::Mailer;
use murmur_core::users::NewAccount;
use murmur_core::{Account, AccountId, AccountLifecycle, Config, MemoryStore, Token};

pub const PASSWORD: &str = "foobar123";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMail {
    Activation {
        email: String,
        account_id: AccountId,
        token: String,
    },
    PasswordReset {
        email: String,
        token: String,
    },
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_activation_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            SentMail::Activation { email, token, .. } if email == to => Some(token),
            _ => None,
        })
    }

    pub fn last_reset_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|mail| match mail {
            SentMail::PasswordReset { email, token } if email == to => Some(token),
            _ => None,
        })
    }
}

impl Mailer for RecordingMailer {
    fn send_activation(&self, email: &str, account_id: &AccountId, token: &Token) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("smtp relay unavailable");
        }
        self.sent.lock().unwrap().push(SentMail::Activation {
            email: email.to_string(),
            account_id: *account_id,
            token: token.as_str().to_string(),
        });
        Ok(())
    }

    fn send_password_reset(&self, email: &str, token: &Token) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("smtp relay unavailable");
        }
        self.sent.lock().unwrap().push(SentMail::PasswordReset {
            email: email.to_string(),
            token: token.as_str().to_string(),
        });
        Ok(())
    }
}

pub type TestLifecycle = AccountLifecycle<MemoryStore, RecordingMailer>;

pub fn lifecycle() -> (TestLifecycle, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new());
    let lifecycle = AccountLifecycle::new(MemoryStore::new(), RecordingMailer::default(), Config::for_tests())
        .expect("lifecycle")
        .with_clock(clock.clone());
    (lifecycle, clock)
}

pub fn new_account(name: &str, email: &str) -> NewAccount {
    NewAccount {
        name: name.to_string(),
        email: email.to_string(),
        password: Some(PASSWORD.to_string()),
    }
}

pub fn signup(lifecycle: &TestLifecycle, name: &str, email: &str) -> Account {
    lifecycle.signup(new_account(name, email)).expect("signup")
}

/// Signs up and activates through the mailed token.
pub fn activated(lifecycle: &TestLifecycle, name: &str, email: &str) -> Account {
    let account = signup(lifecycle, name, email);
    let token = lifecycle
        .mailer()
        .last_activation_token(&account.email)
        .expect("activation mail");
    lifecycle
        .activate(&account.id, &token)
        .expect("activation")
        .account()
        .clone()
}
