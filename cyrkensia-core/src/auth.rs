//! HTTP Basic credential gate backed by an htpasswd file
//!
//! Supported hash formats (as written by Apache `htpasswd`):
//! - bcrypt: `$2y$`, `$2a$`, `$2b$`, `$2x$`
//! - Apache MD5: `$apr1$`
//! - SHA-1: `{SHA}`
//!
//! Loaded once at startup; reload requires a restart.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{Error, Result};

const APR1_MAGIC: &str = "$apr1$";
const SHA_PREFIX: &str = "{SHA}";
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed { user: String },
    Denied,
}

impl AuthOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthOutcome::Allowed { .. })
    }
}

/// Password verification data for one user
#[derive(Debug, Clone, PartialEq, Eq)]
enum PasswordHash {
    Bcrypt(String),
    Apr1 { salt: String, full: String },
    Sha1(String),
}

impl PasswordHash {
    fn parse(raw: &str) -> Option<Self> {
        if raw.starts_with("$2y$")
            || raw.starts_with("$2a$")
            || raw.starts_with("$2b$")
            || raw.starts_with("$2x$")
        {
            return Some(PasswordHash::Bcrypt(raw.to_string()));
        }
        if let Some(rest) = raw.strip_prefix(APR1_MAGIC) {
            let (salt, digest) = rest.split_once('$')?;
            if salt.is_empty() || digest.is_empty() {
                return None;
            }
            return Some(PasswordHash::Apr1 {
                salt: salt.to_string(),
                full: raw.to_string(),
            });
        }
        if let Some(digest) = raw.strip_prefix(SHA_PREFIX) {
            if digest.is_empty() {
                return None;
            }
            return Some(PasswordHash::Sha1(digest.to_string()));
        }
        None
    }

    fn verify(&self, password: &str) -> bool {
        match self {
            PasswordHash::Bcrypt(hash) => bcrypt::verify(password, hash).unwrap_or(false),
            PasswordHash::Apr1 { salt, full } => {
                constant_time_eq(&hash_apr1(password, salt), full)
            }
            PasswordHash::Sha1(digest) => {
                let computed = BASE64.encode(Sha1::digest(password.as_bytes()));
                constant_time_eq(&computed, digest)
            }
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Loaded htpasswd file. Immutable after [`CredentialStore::load`].
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, PasswordHash>,
}

impl CredentialStore {
    /// Load an htpasswd file. Missing, malformed or empty files are errors.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::CredentialFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let store = Self::parse(&raw).map_err(|reason| Error::CredentialFile {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!("Loaded {} credential(s) from {:?}", store.len(), path);
        Ok(store)
    }

    /// Parse htpasswd content: one `user:hash` per line, `#` starts a comment.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut users = HashMap::new();

        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = idx + 1;
            let (user, hash) = line
                .split_once(':')
                .ok_or_else(|| format!("line {}: missing ':' separator", lineno))?;
            if user.is_empty() || hash.is_empty() {
                return Err(format!("line {}: empty username or hash", lineno));
            }
            let hash = PasswordHash::parse(hash)
                .ok_or_else(|| format!("line {}: unsupported hash format for user {}", lineno, user))?;
            users.insert(user.to_string(), hash);
        }

        if users.is_empty() {
            return Err("no credentials defined".into());
        }
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a username/password pair. Usernames are case-sensitive.
    pub fn verify(&self, user: &str, password: &str) -> bool {
        self.users
            .get(user)
            .map(|hash| hash.verify(password))
            .unwrap_or(false)
    }

    /// Evaluate a raw `Authorization` header value.
    ///
    /// Every failure mode maps to [`AuthOutcome::Denied`].
    pub fn authenticate(&self, header: Option<&str>) -> AuthOutcome {
        let Some((user, password)) = header.and_then(decode_basic) else {
            return AuthOutcome::Denied;
        };
        if self.verify(&user, &password) {
            AuthOutcome::Allowed { user }
        } else {
            AuthOutcome::Denied
        }
    }
}

/// Decode `Basic <base64(user:password)>` into its parts.
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let header = header.trim();
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// bcrypt hash suitable for an htpasswd line
pub fn hash_bcrypt(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Apache MD5 (`$apr1$`) hash of `password` with the given salt.
///
/// Only the first 8 salt characters are used.
pub fn hash_apr1(password: &str, salt: &str) -> String {
    let password = password.as_bytes();
    let salt = salt.split('$').next().unwrap_or_default().as_bytes();
    let salt = &salt[..salt.len().min(8)];

    let mut alt = Md5::new();
    alt.update(password);
    alt.update(salt);
    alt.update(password);
    let alt = alt.finalize();

    let mut ctx = Md5::new();
    ctx.update(password);
    ctx.update(APR1_MAGIC.as_bytes());
    ctx.update(salt);

    let mut remaining = password.len();
    while remaining > 0 {
        let n = remaining.min(16);
        ctx.update(&alt[..n]);
        remaining -= n;
    }

    let mut i = password.len();
    while i != 0 {
        if i & 1 != 0 {
            ctx.update([0u8]);
        } else {
            ctx.update(&password[..1]);
        }
        i >>= 1;
    }

    let mut digest = [0u8; 16];
    digest.copy_from_slice(&ctx.finalize());

    // md5-crypt stretching rounds
    for round in 0..1000 {
        let mut ctx = Md5::new();
        if round & 1 != 0 {
            ctx.update(password);
        } else {
            ctx.update(digest);
        }
        if round % 3 != 0 {
            ctx.update(salt);
        }
        if round % 7 != 0 {
            ctx.update(password);
        }
        if round & 1 != 0 {
            ctx.update(digest);
        } else {
            ctx.update(password);
        }
        digest.copy_from_slice(&ctx.finalize());
    }

    let mut out = String::with_capacity(APR1_MAGIC.len() + salt.len() + 23);
    out.push_str(APR1_MAGIC);
    out.push_str(&String::from_utf8_lossy(salt));
    out.push('$');

    let groups = [(0, 6, 12), (1, 7, 13), (2, 8, 14), (3, 9, 15), (4, 10, 5)];
    for (a, b, c) in groups {
        let value = (u32::from(digest[a]) << 16) | (u32::from(digest[b]) << 8) | u32::from(digest[c]);
        push_b64(&mut out, value, 4);
    }
    push_b64(&mut out, u32::from(digest[11]), 2);
    out
}

fn push_b64(out: &mut String, mut value: u32, chars: usize) {
    for _ in 0..chars {
        out.push(ITOA64[(value & 0x3f) as usize] as char);
        value >>= 6;
    }
}
