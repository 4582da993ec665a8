use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;

use crate::config::MIN_PASSWORD_LENGTH;
use crate::core::errors::{CoreError, Field};
use crate::core::helpers::is_blank;

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCost {
    /// argon2 crate defaults, sized for interactive logins.
    Default,
    /// Smallest parameters argon2 accepts. Tests and bulk fixtures only.
    Minimum,
}

impl HashCost {
    fn params(self) -> anyhow::Result<Params> {
        let (m_cost, t_cost, p_cost) = match self {
            HashCost::Default => (
                Params::DEFAULT_M_COST,
                Params::DEFAULT_T_COST,
                Params::DEFAULT_P_COST,
            ),
            HashCost::Minimum => (Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST),
        };
        Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| anyhow::anyhow!("Invalid argon2 parameters: {}", e))
    }
}

const DECOY_SECRET: &str = "murmur decoy secret";

/// Salted, adaptive one-way hashing for passwords and token secrets.
#[derive(Clone)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
    cost: HashCost,
    /// Checked when a login names no account, so a miss costs one full
    /// verification just like a wrong password does.
    decoy_digest: String,
    verifications: Arc<AtomicU64>,
}

impl CredentialStore {
    pub fn new(cost: HashCost) -> anyhow::Result<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, cost.params()?);
        let mut store = Self {
            argon2,
            cost,
            decoy_digest: String::new(),
            verifications: Arc::new(AtomicU64::new(0)),
        };
        store.decoy_digest = store.hash(DECOY_SECRET)?;
        Ok(store)
    }

    pub fn cost(&self) -> HashCost {
        self.cost
    }

    /// Hashes with a fresh salt, so equal inputs never produce equal digests.
    pub fn hash(&self, plaintext: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash secret: {}", e))
    }

    /// Fails closed: a missing or malformed digest never verifies.
    pub fn verify(&self, plaintext: &str, digest: Option<&str>) -> bool {
        let Some(digest) = digest else {
            return false;
        };
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };

        self.verifications.fetch_add(1, Ordering::Relaxed);
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spends one verification on the decoy digest. Always false.
    pub fn verify_decoy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, Some(&self.decoy_digest));
        false
    }

    /// Full argon2 verifications run so far, shared across clones.
    pub fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }
}

/// Password acceptance on create (`required`) and update.
///
/// Returns `Ok(None)` when an update carries no password, meaning the
/// existing digest stays. A present password must be at least
/// [`MIN_PASSWORD_LENGTH`] characters before it is ever hashed.
pub fn accept_password(password: Option<&str>, required: bool) -> Result<Option<&str>, CoreError> {
    match password {
        Some(p) if !is_blank(p) => {
            if p.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(CoreError::validation(
                    Field::Password,
                    format!("is too short (minimum is {} characters)", MIN_PASSWORD_LENGTH),
                ));
            }
            Ok(Some(p))
        }
        _ if required => Err(CoreError::validation(Field::Password, "can't be blank")),
        _ => Ok(None),
    }
}
