//! Burn intent salt generation

use alloy_primitives::B256;
use rand::rngs::OsRng;
use rand::RngCore;

/// Source of per-intent salts; the salt is the only replay nonce of an intent
pub trait SaltSource: Send + Sync {
    fn next_salt(&self) -> B256;
}

/// 32 bytes from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSalt;

impl SaltSource for RandomSalt {
    fn next_salt(&self) -> B256 {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        B256::from(bytes)
    }
}
