use std::sync::Arc;

use cache::EmbeddingCacheProvider;
use index::{EmbeddingId, EmbeddingVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vector::{normalize, round_score, SimilarityConfig, VectorError};

use crate::error::VerifyError;

/// Result of verifying a probe against one reference embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub embedding_id: EmbeddingId,
    /// Subject the reference embedding belongs to.
    pub subject_name: String,
    /// Rounded score in `[0, 1]`.
    pub similarity: f64,
    /// Calculator version of the reference embedding.
    pub calculator: String,
}

/// Scores probe vectors against stored reference embeddings (1:1).
///
/// Each call is one cache lookup plus one O(d) comparison; the tenant is
/// loaded on first use. The caller's probe slice is never modified.
#[derive(Debug, Clone)]
pub struct Predictor {
    cache: Arc<EmbeddingCacheProvider>,
    similarity: SimilarityConfig,
}

impl Predictor {
    pub fn new(cache: Arc<EmbeddingCacheProvider>, similarity: SimilarityConfig) -> Self {
        Self { cache, similarity }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCacheProvider> {
        &self.cache
    }

    pub fn similarity_config(&self) -> &SimilarityConfig {
        &self.similarity
    }

    /// Similarity of `probe` to the stored embedding `reference`.
    pub async fn verify(
        &self,
        tenant: &str,
        probe: &[f64],
        reference: &EmbeddingId,
    ) -> Result<f64, VerifyError> {
        let reference = self.reference(tenant, reference).await?;
        self.score(probe, &reference)
    }

    /// Like [`verify`](Self::verify) but also reports who the reference is.
    pub async fn verify_detailed(
        &self,
        tenant: &str,
        probe: &[f64],
        reference: &EmbeddingId,
    ) -> Result<Verification, VerifyError> {
        let reference = self.reference(tenant, reference).await?;
        let similarity = self.score(probe, &reference)?;
        Ok(Verification {
            embedding_id: reference.id(),
            subject_name: reference.subject_name().to_string(),
            similarity,
            calculator: reference.calculator_version().to_string(),
        })
    }

    /// Scores several probes against one reference, best first.
    pub async fn verify_many(
        &self,
        tenant: &str,
        probes: &[Vec<f64>],
        reference: &EmbeddingId,
    ) -> Result<Vec<f64>, VerifyError> {
        if probes.is_empty() {
            return Err(VerifyError::NoProbes);
        }
        let reference = self.reference(tenant, reference).await?;
        let mut scores = probes
            .iter()
            .map(|probe| self.score(probe, &reference))
            .collect::<Result<Vec<_>, _>>()?;
        scores.sort_by(|a, b| b.total_cmp(a));
        Ok(scores)
    }

    /// Verifies a probe that was produced by `calculator`, refusing to compare
    /// vectors from different extraction models.
    pub async fn verify_with_calculator(
        &self,
        tenant: &str,
        probe: &[f64],
        calculator: &str,
        reference: &EmbeddingId,
    ) -> Result<f64, VerifyError> {
        let reference = self.reference(tenant, reference).await?;
        if reference.calculator_version() != calculator {
            warn!(
                tenant,
                reference = %reference.id(),
                probe_calculator = calculator,
                reference_calculator = reference.calculator_version(),
                "calculator version mismatch"
            );
            return Err(VerifyError::CalculatorMismatch {
                id: reference.id(),
                probe: calculator.to_string(),
                reference: reference.calculator_version().to_string(),
            });
        }
        self.score(probe, &reference)
    }

    /// Subject name of a stored embedding, loading the tenant if needed.
    pub async fn subject_name_of(
        &self,
        tenant: &str,
        id: &EmbeddingId,
    ) -> Result<Option<String>, VerifyError> {
        let index = self.cache.get_or_load(tenant).await?;
        Ok(index.subject_name_of(id))
    }

    async fn reference(
        &self,
        tenant: &str,
        id: &EmbeddingId,
    ) -> Result<EmbeddingVector, VerifyError> {
        let index = self.cache.get_or_load(tenant).await?;
        index.get(id).ok_or_else(|| {
            debug!(tenant, reference = %id, "reference embedding not found");
            metrics::counter!("facecache_verifications_total", "outcome" => "not_found")
                .increment(1);
            VerifyError::NotFound {
                tenant: tenant.to_string(),
                id: *id,
            }
        })
    }

    fn score(&self, probe: &[f64], reference: &EmbeddingVector) -> Result<f64, VerifyError> {
        if probe.len() != reference.dimension() {
            return Err(VerifyError::ProbeDimension {
                expected: reference.dimension(),
                actual: probe.len(),
            });
        }
        let probe = normalize(probe)?;
        let raw = self
            .similarity
            .try_similarity_for(Some(reference.calculator_version()), &probe, reference.vector())
            .map_err(|err| match err {
                VectorError::LengthMismatch { expected, actual } => {
                    VerifyError::ProbeDimension { expected, actual }
                }
                other => VerifyError::InvalidProbe(other),
            })?;
        metrics::counter!("facecache_verifications_total", "outcome" => "scored").increment(1);
        Ok(round_score(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache::{CacheConfig, CacheMutation, EmbeddingStore, InMemoryEmbeddingStore};
    use vector::Coefficients;

    struct Fixture {
        store: Arc<InMemoryEmbeddingStore>,
        predictor: Predictor,
        alice: EmbeddingId,
        bob: EmbeddingId,
    }

    fn fixture(similarity: SimilarityConfig) -> Fixture {
        let store = Arc::new(InMemoryEmbeddingStore::new());
        let alice = EmbeddingVector::from_raw(EmbeddingId::new_v4(), "alice", &[1.0, 0.0, 0.0], "v1")
            .unwrap();
        let bob = EmbeddingVector::from_raw(EmbeddingId::new_v4(), "bob", &[0.0, 2.0, 0.0], "v2")
            .unwrap();
        let (alice_id, bob_id) = (alice.id(), bob.id());
        store.put("t1", alice);
        store.put("t1", bob);

        let dyn_store: Arc<dyn EmbeddingStore> = store.clone();
        let cache = Arc::new(EmbeddingCacheProvider::new(dyn_store, CacheConfig::new(3)));
        Fixture {
            store,
            predictor: Predictor::new(cache, similarity),
            alice: alice_id,
            bob: bob_id,
        }
    }

    #[tokio::test]
    async fn identical_direction_scores_one() {
        let f = fixture(SimilarityConfig::default());
        let score = f.predictor.verify("t1", &[5.0, 0.0, 0.0], &f.alice).await.unwrap();
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn orthogonal_scores_lower() {
        let f = fixture(SimilarityConfig::default());
        let score = f.predictor.verify("t1", &[0.0, 1.0, 0.0], &f.alice).await.unwrap();
        assert!((0.0..1.0).contains(&score));
    }

    #[tokio::test]
    async fn probe_is_not_modified() {
        let f = fixture(SimilarityConfig::default());
        let probe = vec![3.0, 4.0, 0.0];
        f.predictor.verify("t1", &probe, &f.alice).await.unwrap();
        assert_eq!(probe, vec![3.0, 4.0, 0.0]);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let f = fixture(SimilarityConfig::default());
        let err = f
            .predictor
            .verify("t1", &[1.0, 0.0, 0.0], &EmbeddingId::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn bad_probes_are_rejected() {
        let f = fixture(SimilarityConfig::default());
        let err = f.predictor.verify("t1", &[0.0, 0.0, 0.0], &f.alice).await.unwrap_err();
        assert_eq!(err, VerifyError::InvalidProbe(VectorError::DegenerateVector));

        let err = f.predictor.verify("t1", &[1.0, 0.0], &f.alice).await.unwrap_err();
        assert_eq!(
            err,
            VerifyError::ProbeDimension {
                expected: 3,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn detailed_reports_subject_and_calculator() {
        let f = fixture(SimilarityConfig::default());
        let v = f
            .predictor
            .verify_detailed("t1", &[0.0, 1.0, 0.0], &f.bob)
            .await
            .unwrap();
        assert_eq!(v.subject_name, "bob");
        assert_eq!(v.calculator, "v2");
        assert_eq!(v.similarity, 1.0);
        assert_eq!(v.embedding_id, f.bob);

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["subject_name"], "bob");
        assert_eq!(json["embedding_id"], f.bob.to_string());
    }

    #[tokio::test]
    async fn many_probes_sorted_descending() {
        let f = fixture(SimilarityConfig::default());
        let probes = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![1.0, 1.0, 0.0]];
        let scores = f.predictor.verify_many("t1", &probes, &f.alice).await.unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0], 1.0);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));

        let err = f.predictor.verify_many("t1", &[], &f.alice).await.unwrap_err();
        assert_eq!(err, VerifyError::NoProbes);
    }

    #[tokio::test]
    async fn calculator_versions_must_match() {
        let f = fixture(SimilarityConfig::default());
        let ok = f
            .predictor
            .verify_with_calculator("t1", &[1.0, 0.0, 0.0], "v1", &f.alice)
            .await;
        assert_eq!(ok, Ok(1.0));

        let err = f
            .predictor
            .verify_with_calculator("t1", &[1.0, 0.0, 0.0], "v2", &f.alice)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::CalculatorMismatch { .. }));
    }

    #[tokio::test]
    async fn calculator_override_changes_score() {
        let steep = Coefficients::new(0.5, 20.0);
        let f = fixture(SimilarityConfig::default());
        let g = fixture(SimilarityConfig::default().with_calculator("v1", steep));

        let probe = [1.0, 1.0, 0.0];
        let default_score = f.predictor.verify("t1", &probe, &f.alice).await.unwrap();
        let steep_score = g.predictor.verify("t1", &probe, &g.alice).await.unwrap();
        assert_ne!(default_score, steep_score);
    }

    #[tokio::test]
    async fn removed_reference_stops_verifying() {
        let f = fixture(SimilarityConfig::default());
        assert_eq!(
            f.predictor.subject_name_of("t1", &f.alice).await.unwrap().as_deref(),
            Some("alice")
        );

        f.store.remove_subject("t1", "alice");
        f.predictor
            .cache()
            .apply("t1", CacheMutation::RemoveBySubject("alice".into()));

        let err = f.predictor.verify("t1", &[1.0, 0.0, 0.0], &f.alice).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.predictor.subject_name_of("t1", &f.alice).await.unwrap(), None);
    }
}
