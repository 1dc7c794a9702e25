//! Coarse topical buckets for organizing the report.
//!
//! Classification is keyword matching over title, abstract and venue. It only
//! groups candidates for presentation and never affects scoring.

use crate::models::GapCandidate;

/// Catch-all bucket name
pub const OTHER_TOPIC: &str = "Other";

/// Buckets in priority order; the first bucket with a matching keyword wins.
pub const DEFAULT_TOPICS: &[(&str, &[&str])] = &[
    (
        "Machine Learning & AI",
        &["neural network", "deep learning", "machine learning", "transformer", "reinforcement learning", "language model", "artificial intelligence", "classification", "embedding"],
    ),
    (
        "Statistics & Methods",
        &["bayesian", "regression", "statistical", "inference", "estimation", "meta-analysis", "sampling", "monte carlo", "methodology"],
    ),
    (
        "Genomics & Molecular Biology",
        &["genome", "genomic", "gene expression", "protein", "transcriptom", "crispr", "sequencing", "molecular", "cell biology"],
    ),
    (
        "Neuroscience & Cognition",
        &["neuron", "neural circuit", "brain", "cortex", "cognitive", "neuroscience", "memory", "perception"],
    ),
    (
        "Clinical & Health",
        &["clinical", "patient", "disease", "therapy", "treatment", "cancer", "medicine", "epidemiolog", "health"],
    ),
    (
        "Ecology & Environment",
        &["climate", "ecology", "ecosystem", "species", "biodiversity", "environmental", "ocean", "carbon"],
    ),
    (
        "Physics & Engineering",
        &["quantum", "physics", "optical", "semiconductor", "materials", "robot", "control system", "signal processing"],
    ),
    (
        "Social Sciences",
        &["social", "economic", "policy", "education", "survey", "behavior", "political", "psycholog"],
    ),
];

/// A topic bucket with its members
#[derive(Debug, Clone)]
pub struct TopicGroup {
    pub name: String,
    pub candidates: Vec<GapCandidate>,
}

impl TopicGroup {
    /// Mean external citation count of the members.
    pub fn average_impact(&self) -> f64 {
        if self.candidates.is_empty() {
            return 0.0;
        }
        self.candidates.iter().map(|c| c.impact as f64).sum::<f64>() / self.candidates.len() as f64
    }
}

/// Keyword classifier over a fixed, ordered bucket list.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    buckets: Vec<(String, Vec<String>)>,
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_TOPICS
                .iter()
                .map(|(name, keywords)| (name.to_string(), keywords.iter().map(|k| k.to_string()).collect()))
                .collect(),
        )
    }
}

impl TopicClassifier {
    /// Build from `(bucket, keywords)` pairs in priority order.
    pub fn new(buckets: Vec<(String, Vec<String>)>) -> Self {
        let buckets = buckets
            .into_iter()
            .map(|(name, keywords)| (name, keywords.into_iter().map(|k| k.to_lowercase()).collect()))
            .collect();
        Self { buckets }
    }

    /// Bucket name for one candidate.
    pub fn classify(&self, candidate: &GapCandidate) -> String {
        let text = [
            Some(candidate.title.as_str()),
            candidate.abstract_text.as_deref(),
            candidate.venue.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

        self.buckets
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| OTHER_TOPIC.to_string())
    }

    /// Label every candidate and group them in bucket order, `Other` last.
    /// Empty buckets are omitted.
    pub fn group(&self, candidates: &mut [GapCandidate]) -> Vec<TopicGroup> {
        let mut groups: Vec<TopicGroup> = self
            .buckets
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(std::iter::once(OTHER_TOPIC))
            .map(|name| TopicGroup {
                name: name.to_string(),
                candidates: Vec::new(),
            })
            .collect();

        for candidate in candidates.iter_mut() {
            let topic = self.classify(candidate);
            candidate.topic = Some(topic.clone());
            if let Some(group) = groups.iter_mut().find(|g| g.name == topic) {
                group.candidates.push(candidate.clone());
            }
        }

        groups.retain(|g| !g.candidates.is_empty());
        groups
    }
}
