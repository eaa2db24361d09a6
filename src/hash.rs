//! Deterministic hashing primitives used for bucket assignment.
//!
//! These functions must produce the same values as every other client implementation, otherwise
//! the same user lands in different experiment arms depending on which SDK served them.

/// 32-bit rolling string hash (`hash * 31 + code_unit`), wrapping on overflow.
///
/// Hashes UTF-16 code units, so non-ASCII input matches implementations that hash JavaScript or
/// Java strings. The empty string hashes to `0`.
pub fn hash_code(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, c| hash.wrapping_mul(31).wrapping_add(i32::from(c)))
}

/// Combine two hashes into one.
///
/// Unlike [`hash_code`], this is not truncated to 32 bits.
pub fn combine_hash(h1: i32, h2: i32) -> i64 {
    let mut hash: i64 = 17;
    hash = hash * 31 + i64::from(h1);
    hash = hash * 31 + i64::from(h2);
    hash
}

/// Mathematical modulo: the result is always in `[0, m)`, including for negative `n`.
///
/// # Panics
///
/// Panics if `m` is zero.
pub fn modulo(n: i64, m: i64) -> i64 {
    n.rem_euclid(m)
}
