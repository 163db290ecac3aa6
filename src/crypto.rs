//! # Cryptographic Primitives
//!
//! Building blocks for the encrypted file format. Nothing in this module knows about
//! files, records or keyfiles; it only transforms and authenticates byte sequences.
//!
//! ## Algorithms
//!
//! - **Cipher**: AES-256 in counter mode (128-bit big-endian counter)
//! - **Key size**: 256 bits (32 bytes)
//! - **Nonce size**: 128 bits (16 bytes), used as the initial counter block
//! - **Authentication**: HMAC-SHA256 (32-byte tag), kept separate from the cipher
//! - **Key derivation**: HKDF-SHA256 for purpose-bound subkeys
//!
//! Counter mode is self-inverse, so [`encrypt`] and [`decrypt`] are the same keystream
//! application. Integrity is never checked here; callers verify a tag with [`verify`]
//! (or [`Authenticator::verify`]) before decrypting anything.
//!
//! ## Streaming
//!
//! [`Keystream`] and [`Authenticator`] keep their state between calls, so large inputs
//! can be processed in chunks and produce exactly the bytes a one-shot call would.

use crate::error::{GitSafeError, Result};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const KEY_SIZE: usize = 32; // 256 bits
pub const NONCE_SIZE: usize = 16; // one AES block
pub const TAG_SIZE: usize = 32; // HMAC-SHA256 output

pub type Nonce = [u8; NONCE_SIZE];
pub type Tag = [u8; TAG_SIZE];

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

fn check_key_length(key: &[u8]) -> Result<()> {
    if key.len() != KEY_SIZE {
        return Err(GitSafeError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: key.len(),
        });
    }
    Ok(())
}

/// Fill `buf` from the operating system's CSPRNG.
pub fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// AES-256-CTR keystream positioned at the start of `nonce`.
pub struct Keystream {
    cipher: Aes256Ctr,
}

impl Keystream {
    pub fn new(aes_key: &[u8], nonce: &Nonce) -> Result<Self> {
        check_key_length(aes_key)?;
        let cipher = Aes256Ctr::new_from_slices(aes_key, nonce).map_err(|_| {
            GitSafeError::InvalidKeyLength {
                expected: KEY_SIZE,
                got: aes_key.len(),
            }
        })?;
        Ok(Self { cipher })
    }

    /// XOR the next `buf.len()` keystream bytes into `buf`.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}

/// Encrypt `plaintext` under `(aes_key, nonce)`. Output length equals input length.
pub fn encrypt(aes_key: &[u8], nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut keystream = Keystream::new(aes_key, nonce)?;
    let mut out = plaintext.to_vec();
    keystream.apply(&mut out);
    Ok(out)
}

/// Inverse of [`encrypt`]. Does not check integrity.
pub fn decrypt(aes_key: &[u8], nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    encrypt(aes_key, nonce, ciphertext)
}

/// Incremental HMAC-SHA256.
#[derive(Clone)]
pub struct Authenticator {
    mac: HmacSha256,
}

impl Authenticator {
    pub fn new(hmac_key: &[u8]) -> Result<Self> {
        check_key_length(hmac_key)?;
        let mac = HmacSha256::new_from_slice(hmac_key).map_err(|_| {
            GitSafeError::InvalidKeyLength {
                expected: KEY_SIZE,
                got: hmac_key.len(),
            }
        })?;
        Ok(Self { mac })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    pub fn finalize(self) -> Tag {
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&self.mac.finalize().into_bytes());
        tag
    }

    /// Constant-time comparison against `tag`. Any length mismatch is a plain `false`.
    pub fn verify(self, tag: &[u8]) -> bool {
        self.mac.verify_slice(tag).is_ok()
    }
}

/// One-shot HMAC-SHA256 of `message`.
pub fn authenticate(hmac_key: &[u8], message: &[u8]) -> Result<Tag> {
    let mut auth = Authenticator::new(hmac_key)?;
    auth.update(message);
    Ok(auth.finalize())
}

/// Constant-time tag check. Fails closed: a bad key or a malformed tag is `false`.
pub fn verify(hmac_key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    match Authenticator::new(hmac_key) {
        Ok(mut auth) => {
            auth.update(message);
            auth.verify(tag)
        }
        Err(_) => false,
    }
}

/// Truncate a content MAC to a counter-mode nonce.
pub fn nonce_from_tag(tag: &Tag) -> Nonce {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&tag[..NONCE_SIZE]);
    nonce
}

/// Deterministic nonce for `plaintext`: the first 16 bytes of `HMAC(nonce_key, plaintext)`.
pub fn derive_nonce(nonce_key: &[u8], plaintext: &[u8]) -> Result<Nonce> {
    Ok(nonce_from_tag(&authenticate(nonce_key, plaintext)?))
}

/// HKDF-SHA256 expansion of `ikm` into a 32-byte subkey bound to `info`.
pub fn derive_subkey(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(info, okm.as_mut())
        .map_err(|e| GitSafeError::CorruptKeyfile(format!("subkey derivation failed: {e}")))?;
    Ok(okm)
}
