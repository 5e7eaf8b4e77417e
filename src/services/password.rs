use anyhow::{anyhow, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String>;
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

/// Lowest work factor bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// bcrypt with a configurable work factor. The salt and cost live inside
/// the stored hash, so `verify` works across cost changes.
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::with_cost(DEFAULT_COST)
    }
}

impl BcryptPasswordHasher {
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, 31),
        }
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, plain: &str) -> Result<String> {
        if plain.is_empty() {
            return Err(anyhow!("Refusing to hash an empty password"));
        }
        hash(plain, self.cost).context("Failed to hash password")
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        match verify(plain, hash) {
            Ok(matches) => matches,
            Err(e) => {
                log::warn!("Stored password hash could not be checked: {}", e);
                false
            }
        }
    }
}
