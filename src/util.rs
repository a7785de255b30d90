//! Small utility helpers used across modules.

/// FNV-1a, 64-bit, over raw bytes.
///
/// This is the hash the instruction-assignment seed is derived from, so it
/// must stay byte-for-byte stable across releases and platforms. Offset
/// basis and prime are the published FNV-1a constants.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
  const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
  const PRIME: u64 = 0x0000_0100_0000_01b3;

  let mut hash = OFFSET_BASIS;
  for b in bytes {
    hash ^= u64::from(*b);
    hash = hash.wrapping_mul(PRIME);
  }
  hash
}

/// Replace anything outside `[A-Za-z0-9_-]` so a username is safe to embed
/// in a recording filename.
pub fn sanitize_for_filename(s: &str) -> String {
  s.chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
    .collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let mut end = max;
    while !s.is_char_boundary(end) {
      end -= 1;
    }
    format!("{}… ({} bytes total)", &s[..end], s.len())
  }
}
