pub mod dbscan;
pub mod tfidf;
pub mod tokenizer;

use std::collections::BTreeMap;

use nf_core::config::GroupingConfig;
use nf_core::{Grouping, ProcessedArticle, StoryGroup, VectorizationError};
use tracing::{debug, warn};

use self::dbscan::Dbscan;
use self::tfidf::TfidfVectorizer;
use self::tokenizer::{ngrams, Tokenizer};

/// Partitions a category batch into story groups and singletons.
#[derive(Debug, Clone)]
pub struct SimilarityGrouper {
    config: GroupingConfig,
}

impl SimilarityGrouper {
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// Groups articles by body similarity.
    ///
    /// Never fails: batches too small to cluster and batches that cannot be
    /// vectorized come back as all singletons. Membership depends only on
    /// the set of articles; members and singletons keep their input order.
    pub fn group(&self, articles: Vec<ProcessedArticle>) -> Grouping {
        if articles.len() < 2 {
            return Grouping::all_singletons(articles);
        }

        // Cluster in URL order so the partition does not depend on arrival order.
        let mut order: Vec<usize> = (0..articles.len()).collect();
        order.sort_by(|&a, &b| {
            articles[a]
                .url
                .cmp(&articles[b].url)
                .then_with(|| articles[a].body_text.cmp(&articles[b].body_text))
        });
        let bodies: Vec<&str> = order
            .iter()
            .map(|&i| articles[i].body_text.as_str())
            .collect();

        let sorted_labels = match self.cluster_labels(&bodies) {
            Ok(labels) => labels,
            Err(error) => {
                warn!(
                    articles = articles.len(),
                    %error,
                    "Vectorization failed, keeping every article as a singleton"
                );
                return Grouping::all_singletons(articles);
            }
        };
        let mut labels = vec![None; articles.len()];
        for (position, &index) in order.iter().enumerate() {
            labels[index] = sorted_labels[position];
        }

        let mut clusters: BTreeMap<usize, Vec<ProcessedArticle>> = BTreeMap::new();
        let mut singletons = Vec::new();
        for (article, label) in articles.into_iter().zip(labels) {
            match label {
                Some(label) => clusters.entry(label).or_default().push(article),
                None => singletons.push(article),
            }
        }

        let mut groups = Vec::with_capacity(clusters.len());
        for members in clusters.into_values() {
            // min_samples = 1 can yield clusters of one
            if members.len() < 2 {
                singletons.extend(members);
                continue;
            }
            if let Some(group) = StoryGroup::new(members) {
                groups.push(group);
            }
        }

        debug!(
            groups = groups.len(),
            singletons = singletons.len(),
            "Grouped batch"
        );
        Grouping { groups, singletons }
    }

    /// Cluster id per body in the given order, `None` for noise.
    pub fn cluster_labels(
        &self,
        bodies: &[&str],
    ) -> Result<Vec<Option<usize>>, VectorizationError> {
        let Some(first) = bodies.first() else {
            return Ok(Vec::new());
        };
        let tokenizer = Tokenizer::detect(first);
        let documents: Vec<Vec<String>> = bodies
            .iter()
            .map(|body| ngrams(&tokenizer.tokenize(body), self.config.ngram_range))
            .collect();

        let vectors =
            TfidfVectorizer::new(self.config.min_df, self.config.max_df).fit_transform(&documents)?;
        Ok(Dbscan::new(self.config.eps, self.config.min_samples).fit(&vectors))
    }
}
