//! Cosine similarity and exact top-k ranking.

use std::cmp::Ordering;

/// Cosine similarity over the common prefix of `a` and `b`.
///
/// Returns `-1.0` when either vector has zero norm, so such entries always
/// rank last instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);

    for i in 0..n {
        let x = a[i] as f64;
        let y = b[i] as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return -1.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Score every candidate against `query` and keep the best `k`.
///
/// Ties are broken by id so the ranking is deterministic.
pub fn rank_top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<(&'a str, f32)>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&'a str, f32)> = candidates
        .into_iter()
        .map(|(id, embedding)| (id, cosine_similarity(query, embedding)))
        .collect();

    scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_similarity_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_minus_one() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), -1.0);
        assert_eq!(cosine_similarity(&[], &[]), -1.0);
    }

    #[test]
    fn test_common_prefix_only() {
        let score = cosine_similarity(&[1.0, 0.0, 9.0], &[1.0, 0.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_top_k_orders_and_truncates() {
        let a = vec![1.0, 0.0];
        let b = vec![0.7, 0.7];
        let c = vec![0.0, 1.0];
        let candidates = vec![("c", c.as_slice()), ("a", a.as_slice()), ("b", b.as_slice())];

        let ranked = rank_top_k(&[1.0, 0.0], candidates, 2);
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((ranked[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_top_k_zero_query_and_zero_k() {
        let a = vec![1.0, 0.0];
        let zero = vec![0.0, 0.0];
        let candidates = vec![("zero", zero.as_slice()), ("a", a.as_slice())];

        let ranked = rank_top_k(&[0.0, 0.0], candidates.clone(), 5);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|(_, s)| *s == -1.0));

        let ranked = rank_top_k(&[1.0, 0.0], candidates.clone(), 5);
        assert_eq!(ranked.last().map(|(id, _)| *id), Some("zero"));

        assert!(rank_top_k(&[1.0, 0.0], candidates, 0).is_empty());
    }
}
