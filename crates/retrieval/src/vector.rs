//! Canonical vector representation and the defensive parser for embeddings
//! stored in heterogeneous formats.
//!
//! Chunks written by this service store embeddings as a JSON array of f32.
//! Rows written by earlier ingest tooling may instead carry a delimited
//! string (`"0.1,0.2"` or `"[0.1, 0.2]"`). [`parse_embedding`] accepts both;
//! anything else is a typed parse failure the ranking loop can skip.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorParseError {
    #[error("embedding is missing or empty")]
    Empty,
    #[error("unparsable embedding: {0}")]
    Malformed(String),
}

/// Canonical storage form: a JSON array of numbers.
pub fn to_stored(v: &[f32]) -> Value {
    Value::Array(v.iter().map(|f| Value::from(*f as f64)).collect())
}

/// Parse a stored embedding, whatever shape it arrived in.
pub fn parse_embedding(raw: &Value) -> Result<Vec<f32>, VectorParseError> {
    match raw {
        Value::Null => Err(VectorParseError::Empty),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(VectorParseError::Empty);
            }
            items
                .iter()
                .map(|item| {
                    item.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| VectorParseError::Malformed(format!("non-numeric: {item}")))
                })
                .collect()
        },
        Value::String(s) => parse_delimited(s),
        other => Err(VectorParseError::Malformed(format!(
            "unexpected JSON type: {other}"
        ))),
    }
}

fn parse_delimited(s: &str) -> Result<Vec<f32>, VectorParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(VectorParseError::Empty);
    }
    // Legacy rows sometimes wrap the list in brackets; require them balanced.
    let inner = match (trimmed.starts_with('['), trimmed.ends_with(']')) {
        (true, true) => &trimmed[1..trimmed.len() - 1],
        (false, false) => trimmed,
        _ => return Err(VectorParseError::Malformed(truncate(trimmed))),
    };
    let parts: Vec<&str> = if inner.contains(',') {
        inner.split(',').collect()
    } else {
        inner.split_whitespace().collect()
    };
    let values: Result<Vec<f32>, _> = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<f32>()
                .map_err(|_| VectorParseError::Malformed(truncate(trimmed)))
        })
        .collect();
    let values = values?;
    if values.is_empty() {
        return Err(VectorParseError::Empty);
    }
    Ok(values)
}

fn truncate(s: &str) -> String {
    s.chars().take(48).collect()
}

/// Normalize in place; returns the pre-normalization L2 norm. A zero vector
/// stays zero and returns 0.0.
pub fn l2_normalize(v: &mut [f32]) -> f32 {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two equal-length vectors. Returns `None` when
/// lengths differ or either vector has non-positive norm, so degenerate
/// candidates are skipped rather than scored as zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= 0.0 {
        return None;
    }
    Some(dot(a, b) / denom)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let v = parse_embedding(&serde_json::json!([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(v.len(), 3);
        assert!((v[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parses_comma_string() {
        let v = parse_embedding(&serde_json::json!("0.1, 0.2,0.3")).unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn parses_bracketed_string() {
        let v = parse_embedding(&serde_json::json!("[1, 2, 3]")).unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn parses_whitespace_string() {
        let v = parse_embedding(&serde_json::json!("1.5 2.5")).unwrap();
        assert_eq!(v, vec![1.5, 2.5]);
    }

    #[test]
    fn rejects_truncated_string() {
        let err = parse_embedding(&serde_json::json!("[1,2,")).unwrap_err();
        assert!(matches!(err, VectorParseError::Malformed(_)));
    }

    #[test]
    fn rejects_non_numeric_array() {
        let err = parse_embedding(&serde_json::json!([0.1, "x"])).unwrap_err();
        assert!(matches!(err, VectorParseError::Malformed(_)));
    }

    #[test]
    fn empty_cases() {
        assert_eq!(parse_embedding(&Value::Null), Err(VectorParseError::Empty));
        assert_eq!(
            parse_embedding(&serde_json::json!([])),
            Err(VectorParseError::Empty)
        );
        assert_eq!(
            parse_embedding(&serde_json::json!("")),
            Err(VectorParseError::Empty)
        );
    }

    #[test]
    fn stored_form_roundtrips() {
        let stored = to_stored(&[0.5, -1.0]);
        assert!(stored.is_array());
        let back = parse_embedding(&stored).unwrap();
        assert_eq!(back, vec![0.5, -1.0]);
    }

    #[test]
    fn cosine_is_bounded_and_reflexive() {
        let a = vec![0.3, -0.7, 0.2];
        let b = vec![1.0, 0.1, -0.4];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((-1.0..=1.0).contains(&sim));
        let self_sim = cosine_similarity(&a, &a).unwrap();
        assert!((self_sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_skips_degenerate_inputs() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
    }

    #[test]
    fn normalize_yields_unit_norm() {
        let mut v = vec![3.0, 4.0];
        let norm = l2_normalize(&mut v);
        assert!((norm - 5.0).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = vec![0.0, 0.0];
        assert_eq!(l2_normalize(&mut v), 0.0);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
