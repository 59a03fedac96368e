use std::collections::{BTreeMap, BTreeSet};

use nf_core::config::DfBound;
use nf_core::VectorizationError;

/// Sparse L2-normalized vector as `(term index, weight)` pairs sorted by index.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    min_df: DfBound,
    max_df: DfBound,
}

impl TfidfVectorizer {
    pub fn new(min_df: DfBound, max_df: DfBound) -> Self {
        Self { min_df, max_df }
    }

    /// Fits a vocabulary over `documents` and returns one vector per document.
    ///
    /// Terms outside the document-frequency bounds are dropped. A document
    /// left with no terms gets the zero vector.
    pub fn fit_transform(
        &self,
        documents: &[Vec<String>],
    ) -> Result<Vec<SparseVector>, VectorizationError> {
        let n_docs = documents.len();
        let min_docs = self.min_df.min_docs(n_docs);
        let max_docs = self.max_df.max_docs(n_docs);
        if max_docs < min_docs {
            return Err(VectorizationError::InvalidDocumentFrequency { min_docs, max_docs });
        }

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for document in documents {
            let unique: BTreeSet<&str> = document.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        // Sorted terms give stable indices.
        let vocabulary: BTreeMap<&str, (usize, f64)> = document_frequency
            .into_iter()
            .filter(|&(_, df)| df >= min_docs && df <= max_docs)
            .enumerate()
            .map(|(index, (term, df))| (term, (index, smoothed_idf(n_docs, df))))
            .collect();
        if vocabulary.is_empty() {
            return Err(VectorizationError::EmptyVocabulary);
        }

        Ok(documents
            .iter()
            .map(|document| {
                let mut counts: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
                for term in document {
                    if let Some(&(index, idf)) = vocabulary.get(term.as_str()) {
                        counts.entry(index).or_insert((0.0, idf)).0 += 1.0;
                    }
                }
                let mut vector: SparseVector = counts
                    .into_iter()
                    .map(|(index, (tf, idf))| (index, tf * idf))
                    .collect();
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }
}

/// idf(t) = ln((1 + n) / (1 + df(t))) + 1
fn smoothed_idf(n_docs: usize, df: usize) -> f64 {
    ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0
}

fn l2_normalize(vector: &mut SparseVector) {
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, weight) in vector.iter_mut() {
            *weight /= norm;
        }
    }
}

/// Dot product of two index-sorted sparse vectors.
pub fn dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
