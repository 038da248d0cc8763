//! Local File Naming
//!
//! Maps cache keys to file names inside the `files/` directory.

use sha2::{Digest, Sha256};

/// Hex characters of the key digest kept in a local name (128 bits).
const DIGEST_PREFIX_LEN: usize = 32;

/// Longest readable suffix appended after the digest.
const MAX_TAIL_LEN: usize = 64;

/// Derives the on-disk file name for a key.
///
/// The name is `<digest>_<tail>`: the digest prefix of the full key keeps
/// distinct keys apart, the tail is the sanitized last path segment so the
/// extension survives and the directory stays readable.
pub fn local_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    let prefix = &hex[..DIGEST_PREFIX_LEN];

    let segment = key.rsplit('/').next().unwrap_or_default();
    let tail = sanitize_filename(segment);
    // tail is pure ASCII, byte slicing is safe
    let tail = &tail[tail.len().saturating_sub(MAX_TAIL_LEN)..];

    if tail.is_empty() {
        prefix.to_string()
    } else {
        format!("{}_{}", prefix, tail)
    }
}

/// Filters a key down to filesystem-safe characters.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`, maps `/` to `_` and drops
/// everything else, so `bucket/dir/app.apk` becomes `bucket_dir_app.apk`.
pub fn sanitize_filename(key: &str) -> String {
    key.chars()
        .filter_map(|c| match c {
            '/' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            _ => None,
        })
        .collect()
}
