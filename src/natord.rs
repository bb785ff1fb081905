//! Gallery Vault - Natural Order
//!
//! Orders chapter and page names so that `img2.jpg` sorts before
//! `img10.jpg`. Names are compared as sequences of tokens: a maximal run of
//! ASCII digits is one token compared by numeric value, every other byte is
//! its own token compared by value. A name whose tokens are a prefix of the
//! other's sorts first. Ties (`02` vs `2`) fall back to length and then raw
//! bytes so the result is a total order usable as a sort key.

use std::cmp::Ordering;

/// Compare two names in natural order
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a_bytes, b_bytes) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a_bytes.len() && j < b_bytes.len() {
        let (ca, cb) = (a_bytes[i], b_bytes[j]);

        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let a_end = digit_run_end(a_bytes, i);
            let b_end = digit_run_end(b_bytes, j);

            match compare_digits(&a_bytes[i..a_end], &b_bytes[j..b_end]) {
                Ordering::Equal => {}
                other => return other,
            }

            i = a_end;
            j = b_end;
        } else {
            if ca != cb {
                return ca.cmp(&cb);
            }
            i += 1;
            j += 1;
        }
    }

    match (i >= a_bytes.len(), j >= b_bytes.len()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Sort names in place in natural order
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

fn digit_run_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| start + offset)
}

/// Compare two digit runs by value without parsing (no overflow)
fn compare_digits(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(run: &[u8]) -> &[u8] {
    let first = run.iter().position(|&b| b != b'0').unwrap_or(run.len());
    &run[first..]
}
