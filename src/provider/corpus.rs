use super::{SearchHit, TextSearch};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    id: String,
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Lexical search over a local JSON-lines corpus. Each line holds one
/// document: `{"id": ..., "content": ..., "metadata": {...}}`.
///
/// Scoring is query-token overlap (matched query tokens / total query
/// tokens) with a small bonus when the full query occurs as a phrase.
/// Deliberately simple: production deployments point the pipeline at a real
/// text-search engine instead.
#[derive(Debug)]
pub struct CorpusSearch {
    records: Vec<CorpusRecord>,
}

impl CorpusSearch {
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let raw = std::fs::read_to_string(path)?;
        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: CorpusRecord = serde_json::from_str(line).map_err(|e| {
                BackendError::Malformed(format!("corpus line {}: {}", lineno + 1, e))
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn score(query: &str, content: &str) -> f64 {
        let query_lower = query.to_lowercase();
        let content_lower = content.to_lowercase();

        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return 0.0;
        }
        let content_words: HashSet<&str> = content_lower.split_whitespace().collect();

        let matches = query_words.intersection(&content_words).count();
        let mut score = matches as f64 / query_words.len() as f64;
        if query_words.len() > 1 && content_lower.contains(&query_lower) {
            score += 0.5;
        }
        score
    }
}

#[async_trait]
impl TextSearch for CorpusSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, BackendError> {
        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                content: r.content.clone(),
                score: Self::score(query, &r.content),
                metadata: r.metadata.clone(),
            })
            .filter(|h| h.score > 0.0)
            .collect();

        // Descending score, id as deterministic tie-break.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn corpus_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn ranks_by_token_overlap() {
        let file = corpus_file(&[
            r#"{"id":"kb-1","content":"apache 502 errors caused by upstream timeout"}"#,
            r#"{"id":"kb-2","content":"mysql replication lag troubleshooting"}"#,
            r#"{"id":"kb-3","content":"502 gateway errors on nginx"}"#,
        ]);
        let search = CorpusSearch::load(file.path()).unwrap();

        let hits = search.search("apache 502 errors", 10).await.unwrap();
        assert_eq!(hits[0].id, "kb-1");
        assert!(hits.iter().all(|h| h.id != "kb-2"));
    }

    #[tokio::test]
    async fn respects_k_and_is_deterministic() {
        let file = corpus_file(&[
            r#"{"id":"b","content":"disk alert"}"#,
            r#"{"id":"a","content":"disk alert"}"#,
            r#"{"id":"c","content":"disk alert"}"#,
        ]);
        let search = CorpusSearch::load(file.path()).unwrap();

        let hits = search.search("disk", 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn malformed_line_is_reported_with_position() {
        let file = corpus_file(&[r#"{"id":"a","content":"x"}"#, "not json"]);
        let err = CorpusSearch::load(file.path()).unwrap_err();
        assert!(matches!(err, BackendError::Malformed(msg) if msg.contains("line 2")));
    }
}
