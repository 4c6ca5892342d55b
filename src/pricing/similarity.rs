//! TF-IDF cosine similarity between a search query and marketplace titles.

use std::collections::{HashMap, HashSet};

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn term_counts(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Scores each title against the query, in input order. Scores lie in `0..=1`.
///
/// The corpus is the query plus every title, with smoothed inverse document
/// frequency `ln((1 + n) / (1 + df)) + 1`, so words shared by most titles
/// weigh less than distinctive ones.
pub fn similarity_scores(query: &str, titles: &[&str]) -> Vec<f64> {
    let query_tokens = tokenize(query);
    let title_tokens: Vec<Vec<String>> = titles.iter().map(|t| tokenize(t)).collect();

    let documents = titles.len() + 1;
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for tokens in std::iter::once(&query_tokens).chain(title_tokens.iter()) {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in unique {
            *document_frequency.entry(term).or_insert(0) += 1;
        }
    }

    let idf = |term: &str| {
        let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
        ((1.0 + documents as f64) / (1.0 + df)).ln() + 1.0
    };
    let weigh = |tokens: &[String]| -> HashMap<String, f64> {
        term_counts(tokens)
            .into_iter()
            .map(|(term, count)| (term.to_string(), count * idf(term)))
            .collect()
    };

    let query_vector = weigh(&query_tokens);
    let query_norm = query_vector.values().map(|w| w * w).sum::<f64>().sqrt();

    title_tokens
        .iter()
        .map(|tokens| {
            let title_vector = weigh(tokens);
            let title_norm = title_vector.values().map(|w| w * w).sum::<f64>().sqrt();
            if query_norm == 0.0 || title_norm == 0.0 {
                return 0.0;
            }
            let dot: f64 = query_vector
                .iter()
                .filter_map(|(term, weight)| title_vector.get(term).map(|w| w * weight))
                .sum();
            (dot / (query_norm * title_norm)).clamp(0.0, 1.0)
        })
        .collect()
}
