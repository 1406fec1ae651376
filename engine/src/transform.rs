//! Payload transforms applied at the upload/download boundary.
//!
//! Concrete codecs and ciphers live outside the engine; these traits are the
//! narrow seams they plug into. The engine mirrors which transforms were
//! applied into item metadata (`compressed`, `encrypted`) so the receiving
//! side can undo them.

use crate::error::Result;
use tether_merge::Value;

/// Value-to-value compression.
pub trait Compressor: Send + Sync {
    fn compress(&self, value: &Value) -> Result<Value>;
    fn decompress(&self, value: &Value) -> Result<Value>;
}

/// Value-to-value encryption.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, value: &Value) -> Result<Value>;
    fn decrypt(&self, value: &Value) -> Result<Value>;
}
