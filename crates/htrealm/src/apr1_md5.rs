//! Apache APR1-MD5 password hashing.
//!
//! Stored credentials have the shape `$apr1$salt$digest`, where `salt` holds up
//! to eight characters and `digest` is 22 characters of the `itoa64` alphabet.
//!
//! The routine follows `apr_md5_encode()` from Apache's `apr-util`
//! (`crypto/apr_md5.c`), itself derived from the FreeBSD MD5 `crypt()`.
//!
//! # Security Warning
//!
//! MD5 is cryptographically broken. Only verification of existing htpasswd
//! entries is supported here.

use md5::{Digest, Md5};

/// Custom base64 alphabet (itoa64) used by APR1-MD5.
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// APR1-MD5 hash prefix.
pub const APR1_PREFIX: &str = "$apr1$";

/// Maximum salt length in characters.
pub const APR1_SALT_LEN: usize = 8;

const APR1_ROUNDS: u32 = 1000;

/// Appends `n` 6-bit groups of `v` to `out` (Apache's `to64`).
fn to64(out: &mut String, mut v: u32, n: usize) {
    for _ in 0..n {
        out.push(char::from(ITOA64[(v & 0x3f) as usize]));
        v >>= 6;
    }
}

/// Encodes a 16-byte digest into the 22-character APR1 form.
///
/// The byte triplets are taken in the same shuffled order as `apr_md5.c`.
fn encode_digest(digest: &[u8]) -> String {
    const TRIPLETS: [(usize, usize, usize); 5] =
        [(0, 6, 12), (1, 7, 13), (2, 8, 14), (3, 9, 15), (4, 10, 5)];

    let mut out = String::with_capacity(22);
    for (a, b, c) in TRIPLETS {
        let v = u32::from(digest[a]) << 16 | u32::from(digest[b]) << 8 | u32::from(digest[c]);
        to64(&mut out, v, 4);
    }
    to64(&mut out, u32::from(digest[11]), 2);
    out
}

/// Cuts `salt` down to at most [`APR1_SALT_LEN`] characters.
fn truncate_salt(salt: &str) -> &str {
    match salt.char_indices().nth(APR1_SALT_LEN) {
        Some((end, _)) => &salt[..end],
        None => salt,
    }
}

/// Extracts the salt from a stored `$apr1$salt$digest` string.
///
/// Returns `None` when the APR1 prefix is missing.
pub fn extract_salt(hash_str: &str) -> Option<&str> {
    let rest = hash_str.strip_prefix(APR1_PREFIX)?;
    let end = rest.find('$').unwrap_or(rest.len());
    Some(truncate_salt(&rest[..end]))
}

/// Hash `password` with `salt`, producing `$apr1$salt$digest`.
///
/// Salts longer than eight characters are truncated.
pub fn hash(password: &str, salt: &str) -> String {
    let pw = password.as_bytes();
    let salt = truncate_salt(salt);

    let alternate = Md5::new()
        .chain_update(pw)
        .chain_update(salt)
        .chain_update(pw)
        .finalize();

    let mut ctx = Md5::new();
    ctx.update(pw);
    ctx.update(APR1_PREFIX);
    ctx.update(salt);

    let mut remaining = pw.len();
    while remaining > 0 {
        let take = remaining.min(alternate.len());
        ctx.update(&alternate[..take]);
        remaining -= take;
    }

    // One byte per bit of the password length: NUL for set bits, the first
    // password byte for cleared ones.
    let mut bits = pw.len();
    while bits > 0 {
        if bits & 1 == 1 {
            ctx.update([0u8]);
        } else {
            ctx.update(&pw[..1]);
        }
        bits >>= 1;
    }

    let mut digest = ctx.finalize();

    for round in 0..APR1_ROUNDS {
        let mut ctx = Md5::new();
        if round & 1 == 1 {
            ctx.update(pw);
        } else {
            ctx.update(digest);
        }
        if round % 3 != 0 {
            ctx.update(salt);
        }
        if round % 7 != 0 {
            ctx.update(pw);
        }
        if round & 1 == 1 {
            ctx.update(digest);
        } else {
            ctx.update(pw);
        }
        digest = ctx.finalize();
    }

    format!("{APR1_PREFIX}{salt}${}", encode_digest(&digest))
}

/// Verify `password` against a stored APR1 hash.
///
/// Returns `false` for anything not carrying the `$apr1$` prefix; callers that
/// need to tell that case apart should check [`is_apr1`] first.
pub fn verify(password: &str, hash_str: &str) -> bool {
    let Some(salt) = extract_salt(hash_str) else {
        return false;
    };
    let computed = hash(password, salt);

    // Constant time over the stored length.
    computed.len() == hash_str.len()
        && computed
            .bytes()
            .zip(hash_str.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Whether `hash_str` uses the APR1 scheme.
pub fn is_apr1(hash_str: &str) -> bool {
    hash_str.starts_with(APR1_PREFIX)
}
