//! Candidate selection
//!
//! Indexers report many re-encodes of the same release and no reliable
//! codec/resolution field, so byte size is used as the quality proxy:
//! among candidates with enough seeders the largest one wins.

use crate::types::Candidate;

/// Pick the best candidate, or `None` when nothing is seeded well enough.
///
/// Candidates with fewer than `min_seeders` seeders are discarded. The rest are
/// ranked by size, largest first; ties keep their input order.
///
/// # Examples
///
/// ```
/// use rank_dl::selector::select;
/// use rank_dl::types::Candidate;
///
/// let candidate = |size_bytes, seeders| Candidate {
///     title: "release".into(),
///     link: format!("magnet:?xt=urn:btih:{size_bytes}"),
///     size_bytes,
///     seeders,
///     peers: 0,
///     tracker: "tracker".into(),
///     info_hash: None,
/// };
///
/// let candidates = [candidate(500, 0), candidate(200, 5)];
/// let picked = select(&candidates, 1).unwrap();
/// assert_eq!(picked.size_bytes, 200);
/// ```
pub fn select(candidates: &[Candidate], min_seeders: i64) -> Option<&Candidate> {
    let mut eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.seeders >= min_seeders)
        .collect();
    // sort_by is stable
    eligible.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    eligible.into_iter().next()
}
