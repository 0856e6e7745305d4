//! Anti-forgery tokens for the listing and export endpoints.
//!
//! A token is bound to a session and to a time tick of half the configured
//! lifetime; verification accepts the current and the previous tick, so a
//! token stays valid for between one half and one full lifetime.

use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

const ACTION: &str = "archive";
const TOKEN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NonceError {
    #[error("missing anti-forgery token")]
    Missing,
    #[error("invalid anti-forgery token")]
    Invalid,
}

#[derive(Clone)]
pub struct NonceGuard {
    secret: Vec<u8>,
    half_life_secs: i64,
}

impl NonceGuard {
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        let half = i64::try_from(lifetime.as_secs() / 2).unwrap_or(i64::MAX);
        Self {
            secret: secret.as_ref().to_vec(),
            half_life_secs: half.max(1),
        }
    }

    pub fn issue(&self, session: &str, now: OffsetDateTime) -> String {
        self.token_for(self.tick(now), session)
    }

    pub fn verify(
        &self,
        token: Option<&str>,
        session: &str,
        now: OffsetDateTime,
    ) -> Result<(), NonceError> {
        let token = token
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(NonceError::Missing)?;

        let tick = self.tick(now);
        let accepted = [tick, tick - 1].into_iter().any(|candidate| {
            let expected = self.token_for(candidate, session);
            bool::from(expected.as_bytes().ct_eq(token.as_bytes()))
        });

        if accepted {
            Ok(())
        } else {
            Err(NonceError::Invalid)
        }
    }

    fn tick(&self, now: OffsetDateTime) -> i64 {
        now.unix_timestamp().div_euclid(self.half_life_secs) + 1
    }

    fn token_for(&self, tick: i64, session: &str) -> String {
        let message = format!("{tick}|{ACTION}|{session}");

        let mut inner = Sha256::new();
        inner.update(&self.secret);
        inner.update(message.as_bytes());
        let inner = inner.finalize();

        let mut outer = Sha256::new();
        outer.update(&self.secret);
        outer.update(inner);
        let mut token = hex::encode(outer.finalize());
        token.truncate(TOKEN_LEN);
        token
    }
}

impl std::fmt::Debug for NonceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceGuard")
            .field("half_life_secs", &self.half_life_secs)
            .finish_non_exhaustive()
    }
}
