//! # Encrypted File Record
//!
//! ## Layout (version 1)
//!
//! ```text
//! [\0GITSAFE][version: 1][nonce: 16][ciphertext: n][tag: 32]
//! ```
//!
//! - `nonce` = first 16 bytes of `HMAC-SHA256(nonce_key, plaintext)`, so identical
//!   content always produces an identical record under a given key. Unchanged files
//!   therefore produce unchanged blobs and clean diffs.
//! - `ciphertext` = AES-256-CTR of the plaintext with `nonce` as the initial counter block.
//! - `tag` = `HMAC-SHA256(hmac_key, version || nonce || ciphertext)`.
//!
//! Opening a record always verifies the tag over the whole record before a single byte of
//! plaintext is produced. A failed check yields [`GitSafeError::IntegrityViolation`] and
//! nothing else.
//!
//! Both in-memory ([`seal`], [`open`]) and streaming ([`seal_stream`], [`open_stream`],
//! [`verify_stream`]) forms are provided; they produce and accept identical bytes.

use crate::crypto::{
    derive_nonce, encrypt, nonce_from_tag, Authenticator, Keystream, Nonce, NONCE_SIZE, TAG_SIZE,
};
use crate::error::{GitSafeError, Result};
use crate::key::KeyMaterial;
use std::io::{self, Read, Seek, SeekFrom, Write};
use zeroize::Zeroizing;

pub const MAGIC: &[u8; 8] = b"\0GITSAFE";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = MAGIC.len() + 1 + NONCE_SIZE;
pub const MIN_RECORD_LEN: usize = HEADER_LEN + TAG_SIZE;

const CHUNK_SIZE: usize = 64 * 1024;

/// Does `prefix` (the first bytes of a file) start with the record magic?
pub fn is_encrypted(prefix: &[u8]) -> bool {
    prefix.len() >= MAGIC.len() && &prefix[..MAGIC.len()] == MAGIC
}

/// Read up to `MAGIC.len()` bytes from `reader` and check them.
pub fn sniff<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut prefix = [0u8; MAGIC.len()];
    let n = read_full(reader, &mut prefix)?;
    Ok(is_encrypted(&prefix[..n]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub nonce: Nonce,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if !is_encrypted(bytes) {
            return Err(GitSafeError::IntegrityViolation(
                "missing record header".into(),
            ));
        }
        if bytes.len() < HEADER_LEN {
            return Err(GitSafeError::IntegrityViolation("record truncated".into()));
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(GitSafeError::UnsupportedFormat(version));
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[MAGIC.len() + 1..HEADER_LEN]);
        Ok(Self { version, nonce })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..MAGIC.len()].copy_from_slice(MAGIC);
        out[MAGIC.len()] = self.version;
        out[MAGIC.len() + 1..].copy_from_slice(&self.nonce);
        out
    }

    /// Authenticator already fed with the authenticated header fields.
    fn authenticator(&self, keys: &KeyMaterial) -> Result<Authenticator> {
        let mut auth = Authenticator::new(keys.hmac_key())?;
        auth.update(&[self.version]);
        auth.update(&self.nonce);
        Ok(auth)
    }
}

/// Encrypt `plaintext` into a complete record.
pub fn seal(keys: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    let header = Header {
        version: FORMAT_VERSION,
        nonce: derive_nonce(keys.nonce_key(), plaintext)?,
    };
    let ciphertext = encrypt(keys.aes_key(), &header.nonce, plaintext)?;

    let mut auth = header.authenticator(keys)?;
    auth.update(&ciphertext);
    let tag = auth.finalize();

    let mut record = Vec::with_capacity(MIN_RECORD_LEN + ciphertext.len());
    record.extend_from_slice(&header.to_bytes());
    record.extend_from_slice(&ciphertext);
    record.extend_from_slice(&tag);
    Ok(record)
}

/// Verify and decrypt a complete record.
pub fn open(keys: &KeyMaterial, record: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let header = Header::parse(record)?;
    if record.len() < MIN_RECORD_LEN {
        return Err(GitSafeError::IntegrityViolation("record truncated".into()));
    }
    let (body, tag) = record[HEADER_LEN..].split_at(record.len() - MIN_RECORD_LEN);

    let mut auth = header.authenticator(keys)?;
    auth.update(body);
    if !auth.verify(tag) {
        return Err(GitSafeError::IntegrityViolation(
            "authentication tag mismatch".into(),
        ));
    }

    let mut plaintext = Zeroizing::new(body.to_vec());
    Keystream::new(keys.aes_key(), &header.nonce)?.apply(&mut plaintext);
    Ok(plaintext)
}

/// Stream `input` (plaintext) into `output` as a record. Returns the plaintext length.
///
/// The input is read twice: once to derive the nonce, once to encrypt. The second pass
/// derives the nonce again and fails if the input changed in between, so a nonce is never
/// paired with different plaintext. On error `output` holds a partial record and must be
/// discarded.
pub fn seal_stream<R, W>(keys: &KeyMaterial, input: &mut R, output: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    let mut buf = Zeroizing::new(vec![0u8; CHUNK_SIZE]);

    input.rewind()?;
    let mut nonce_auth = Authenticator::new(keys.nonce_key())?;
    loop {
        let n = read_full(input, &mut buf)?;
        if n == 0 {
            break;
        }
        nonce_auth.update(&buf[..n]);
    }
    let header = Header {
        version: FORMAT_VERSION,
        nonce: nonce_from_tag(&nonce_auth.finalize()),
    };

    input.rewind()?;
    output.write_all(&header.to_bytes())?;
    let mut keystream = Keystream::new(keys.aes_key(), &header.nonce)?;
    let mut auth = header.authenticator(keys)?;
    let mut recheck = Authenticator::new(keys.nonce_key())?;
    let mut total = 0u64;
    loop {
        let n = read_full(input, &mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        recheck.update(chunk);
        keystream.apply(chunk);
        auth.update(chunk);
        output.write_all(chunk)?;
        total += n as u64;
    }
    if nonce_from_tag(&recheck.finalize()) != header.nonce {
        return Err(GitSafeError::IntegrityViolation(
            "input changed while encrypting".into(),
        ));
    }
    output.write_all(&auth.finalize())?;
    Ok(total)
}

/// Check a record's tag without producing any plaintext.
pub fn verify_stream<R: Read + Seek>(keys: &KeyMaterial, input: &mut R) -> Result<Header> {
    let len = input.seek(SeekFrom::End(0))?;
    input.rewind()?;

    let mut header_bytes = [0u8; HEADER_LEN];
    let n = read_full(input, &mut header_bytes)?;
    let header = Header::parse(&header_bytes[..n])?;
    if len < MIN_RECORD_LEN as u64 {
        return Err(GitSafeError::IntegrityViolation("record truncated".into()));
    }

    let body_len = len - MIN_RECORD_LEN as u64;
    let mut auth = header.authenticator(keys)?;
    let mut body = input.by_ref().take(body_len);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_full(&mut body, &mut buf)?;
        if n == 0 {
            break;
        }
        auth.update(&buf[..n]);
    }

    let mut tag = [0u8; TAG_SIZE];
    let n = read_full(input, &mut tag)?;
    if n != TAG_SIZE || !auth.verify(&tag) {
        return Err(GitSafeError::IntegrityViolation(
            "authentication tag mismatch".into(),
        ));
    }
    Ok(header)
}

/// Verify `input` as a record, then stream its plaintext into `output`.
///
/// Nothing is written to `output` unless the whole record authenticates. The decrypting
/// pass authenticates the bytes again as it reads them; if the record changed since the
/// first pass an error is returned and the partial `output` must be discarded.
pub fn open_stream<R, W>(keys: &KeyMaterial, input: &mut R, output: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    let header = verify_stream(keys, input)?;
    let changed = || GitSafeError::IntegrityViolation("record changed while decrypting".into());

    let len = input.seek(SeekFrom::End(0))?;
    input.rewind()?;
    let mut header_bytes = [0u8; HEADER_LEN];
    let n = read_full(input, &mut header_bytes)?;
    if len < MIN_RECORD_LEN as u64 || n != HEADER_LEN || header_bytes != header.to_bytes() {
        return Err(changed());
    }
    let body_len = len - MIN_RECORD_LEN as u64;

    let mut keystream = Keystream::new(keys.aes_key(), &header.nonce)?;
    let mut auth = header.authenticator(keys)?;
    let mut body = input.by_ref().take(body_len);
    let mut buf = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
    let mut total = 0u64;
    loop {
        let n = read_full(&mut body, &mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        auth.update(chunk);
        keystream.apply(chunk);
        output.write_all(chunk)?;
        total += n as u64;
    }

    let mut tag = [0u8; TAG_SIZE];
    let n = read_full(input, &mut tag)?;
    if n != TAG_SIZE || !auth.verify(&tag) {
        return Err(changed());
    }
    Ok(total)
}

/// Fill `buf` as far as the reader allows. Returns the byte count; short only at EOF.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
