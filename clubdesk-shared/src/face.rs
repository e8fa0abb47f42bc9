/// Face-encoding matching
///
/// Encodings are 128-dimensional vectors produced by an external face
/// detector. This module validates them, keeps the active students'
/// encodings in memory and finds the closest known face for a probe.
///
/// # Example
///
/// ```
/// use clubdesk_shared::face::{FaceEntry, FaceIndex, ENCODING_LEN};
/// use uuid::Uuid;
///
/// # #[tokio::main]
/// # async fn main() {
/// let index = FaceIndex::new();
/// let student_id = Uuid::new_v4();
/// index
///     .replace(vec![FaceEntry {
///         student_id,
///         full_name: "Aziz".to_string(),
///         encoding: vec![0.1; ENCODING_LEN],
///     }])
///     .await;
///
/// let found = index.best_match(&vec![0.1; ENCODING_LEN], 0.6).await;
/// assert_eq!(found.map(|m| m.student_id), Some(student_id));
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Number of values in an encoding
pub const ENCODING_LEN: usize = 128;

/// Default maximum distance for two encodings to be the same person
pub const DEFAULT_TOLERANCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FaceError {
    #[error("Face encoding must have 128 values, got {0}")]
    WrongLength(usize),

    #[error("Face encoding contains a non-finite value")]
    NonFinite,
}

/// Checks that an encoding can be stored and compared
pub fn validate_encoding(encoding: &[f64]) -> Result<(), FaceError> {
    if encoding.len() != ENCODING_LEN {
        return Err(FaceError::WrongLength(encoding.len()));
    }
    if !encoding.iter().all(|v| v.is_finite()) {
        return Err(FaceError::NonFinite);
    }
    Ok(())
}

/// Euclidean distance between two encodings
///
/// Extra trailing values of the longer slice are ignored.
pub fn face_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// A known face
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FaceEntry {
    pub student_id: Uuid,
    pub full_name: String,
    pub encoding: Vec<f64>,
}

/// Result of a successful match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub student_id: Uuid,
    pub full_name: String,
    pub distance: f64,
}

fn closest(entries: &[FaceEntry], probe: &[f64], tolerance: f64) -> Option<FaceMatch> {
    entries
        .iter()
        .map(|e| (e, face_distance(&e.encoding, probe)))
        .filter(|(_, d)| *d <= tolerance)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(e, distance)| FaceMatch {
            student_id: e.student_id,
            full_name: e.full_name.clone(),
            distance,
        })
}

/// In-memory index of active students' face encodings
#[derive(Debug, Default)]
pub struct FaceIndex {
    entries: RwLock<Vec<FaceEntry>>,
}

impl FaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a new set of encodings, skipping malformed ones
    pub async fn replace(&self, entries: Vec<FaceEntry>) {
        let valid: Vec<FaceEntry> = entries
            .into_iter()
            .filter(|e| validate_encoding(&e.encoding).is_ok())
            .collect();
        *self.entries.write().await = valid;
    }

    /// Reloads encodings of all active students from the database
    pub async fn reload(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let entries: Vec<FaceEntry> = sqlx::query_as(
            r#"
            SELECT id AS student_id, full_name, face_encoding AS encoding
            FROM students
            WHERE status = 'active' AND face_encoding IS NOT NULL
            "#,
        )
        .fetch_all(pool)
        .await?;

        self.replace(entries).await;
        let loaded = self.len().await;
        info!(faces = loaded, "Face index reloaded");
        Ok(loaded)
    }

    /// Number of indexed faces
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Closest known face within `tolerance`
    pub async fn best_match(&self, probe: &[f64], tolerance: f64) -> Option<FaceMatch> {
        closest(&self.entries.read().await, probe, tolerance)
    }

    /// Matches several probes at once, reporting each student at most once
    pub async fn match_many(&self, probes: &[Vec<f64>], tolerance: f64) -> Vec<FaceMatch> {
        let entries = self.entries.read().await;
        let mut found: Vec<FaceMatch> = Vec::new();

        for probe in probes {
            if let Some(m) = closest(&entries, probe, tolerance) {
                if !found.iter().any(|f| f.student_id == m.student_id) {
                    found.push(m);
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding(value: f64) -> Vec<f64> {
        vec![value; ENCODING_LEN]
    }

    fn entry(name: &str, value: f64) -> FaceEntry {
        FaceEntry {
            student_id: Uuid::new_v4(),
            full_name: name.to_string(),
            encoding: encoding(value),
        }
    }

    #[test]
    fn test_validate_encoding() {
        assert!(validate_encoding(&encoding(0.0)).is_ok());
        assert_eq!(
            validate_encoding(&[0.0; 3]),
            Err(FaceError::WrongLength(3))
        );

        let mut bad = encoding(0.0);
        bad[5] = f64::NAN;
        assert_eq!(validate_encoding(&bad), Err(FaceError::NonFinite));
    }

    #[test]
    fn test_face_distance() {
        assert_eq!(face_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(face_distance(&encoding(0.2), &encoding(0.2)), 0.0);
    }

    #[tokio::test]
    async fn test_best_match_picks_closest_within_tolerance() {
        let index = FaceIndex::new();
        let near = entry("Near", 0.01);
        let far = entry("Far", 0.04);
        index.replace(vec![far.clone(), near.clone()]).await;

        // distance to Near = 0.01 * sqrt(128) ~ 0.113, to Far ~ 0.452
        let found = index.best_match(&encoding(0.0), 0.6).await.unwrap();
        assert_eq!(found.student_id, near.student_id);

        assert!(index.best_match(&encoding(0.0), 0.1).await.is_none());
    }

    #[tokio::test]
    async fn test_replace_skips_malformed_entries() {
        let index = FaceIndex::new();
        let mut short = entry("Short", 0.0);
        short.encoding.truncate(10);

        index.replace(vec![short, entry("Ok", 0.0)]).await;
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_match_many_deduplicates() {
        let index = FaceIndex::new();
        let a = entry("A", 0.0);
        let b = entry("B", 1.0);
        index.replace(vec![a.clone(), b.clone()]).await;

        let found = index
            .match_many(&[encoding(0.0), encoding(0.001), encoding(1.0), encoding(5.0)], 0.6)
            .await;

        let ids: Vec<Uuid> = found.iter().map(|m| m.student_id).collect();
        assert_eq!(ids, vec![a.student_id, b.student_id]);
    }
}
