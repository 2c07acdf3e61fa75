use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    Active,
    Superseded,
}

/// One retrievable fact in working memory.
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    pub id: String,
    pub content: String,
    pub status: MemoryStatus,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
    pub retrievable: bool,
}

/// A consolidated, higher-confidence distillation of several memory units.
#[derive(Debug, Clone)]
pub struct Crystal {
    pub id: String,
    pub content: String,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
    pub source_unit_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalWeights {
    pub lexical: f64,
    pub recency: f64,
    pub confidence: f64,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self { lexical: 0.5, recency: 0.25, confidence: 0.25 }
    }
}

impl RetrievalWeights {
    fn normalized(self) -> Self {
        let sum = self.lexical + self.recency + self.confidence;
        if sum <= 0.0 {
            return Self::default();
        }
        Self { lexical: self.lexical / sum, recency: self.recency / sum, confidence: self.confidence / sum }
    }
}

#[derive(Debug, Clone)]
pub struct RankedHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub lex_score: f64,
    pub recency_score: f64,
    pub confidence_score: f64,
    pub updated_at: DateTime<Utc>,
}

fn alias_map() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static MAP: std::sync::OnceLock<HashMap<&'static str, &'static [&'static str]>> = std::sync::OnceLock::new();
    MAP.get_or_init(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("db", &["postgres", "sql", "database"]);
        m.insert("postgres", &["db", "sql", "database"]);
        m.insert("sql", &["db", "postgres", "database"]);
        m.insert("js", &["javascript"]);
        m.insert("javascript", &["js"]);
        m
    })
}

/// Unicode-letter/digit tokenization, lowercased, with a small suffix
/// stemmer and alias expansion. Not a general-purpose tokenizer: tuned for
/// short free-text queries and memory content.
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for raw in text.split(|c: char| !(c.is_alphanumeric())) {
        if raw.is_empty() {
            continue;
        }
        let lower = raw.to_lowercase();
        let stemmed = stem(&lower);
        if let Some(aliases) = alias_map().get(stemmed.as_str()) {
            for alias in *aliases {
                tokens.insert(alias.to_string());
            }
        }
        tokens.insert(stemmed);
    }
    tokens
}

fn stem(word: &str) -> String {
    for suffix in ["ing", "tion", "ness", "ed", "es", "s"] {
        if word.len() > suffix.len() + 2 && word.ends_with(suffix) {
            return word[..word.len() - suffix.len()].to_string();
        }
    }
    word.to_string()
}

fn recency_score(age_days: f64) -> f64 {
    1.0 / (1.0 + age_days.max(0.0))
}

/// Scores and ranks retrievable candidates against a free-text query.
/// Entries with zero lexical overlap still qualify via a weak-semantic
/// floor so recency/confidence alone can surface a candidate.
pub fn retrieve<'a>(
    query: &str,
    units: impl Iterator<Item = &'a MemoryUnit>,
    weights: RetrievalWeights,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<RankedHit> {
    let weights = weights.normalized();
    let query_tokens = tokenize(query);

    let mut hits: Vec<RankedHit> = units
        .filter(|u| u.status != MemoryStatus::Superseded && u.retrievable)
        .map(|unit| {
            let content_tokens = tokenize(&unit.content);
            let overlap = query_tokens.intersection(&content_tokens).count();
            let lex = if query_tokens.is_empty() { 0.0 } else { overlap as f64 / query_tokens.len() as f64 };
            let age_days = (now - unit.updated_at).num_seconds() as f64 / 86_400.0;
            let rec = recency_score(age_days);
            let conf = unit.confidence.clamp(0.0, 1.0);

            let weak_floor = (weights.recency + weights.confidence) * 0.35;
            let computed = weights.lexical * lex + weights.recency * rec + weights.confidence * conf;
            let score = if lex == 0.0 { computed.max(weak_floor) } else { computed };

            RankedHit {
                id: unit.id.clone(),
                content: unit.content.clone(),
                score,
                lex_score: lex,
                recency_score: rec,
                confidence_score: conf,
                updated_at: unit.updated_at,
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(b.updated_at.cmp(&a.updated_at)));
    hits.truncate(limit);
    hits
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    Full,
    MissingOnly,
}

/// Per-session working memory and crystal store. `rebuild` is invoked
/// during hydration (`missing_only` reuses whatever the checkpoint already
/// restored; `full` discards and refolds everything from the event log).
#[derive(Default)]
pub struct MemoryStore {
    units: HashMap<String, MemoryUnit>,
    crystals: HashMap<String, Crystal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_unit(&mut self, unit: MemoryUnit) {
        self.units.insert(unit.id.clone(), unit);
    }

    pub fn supersede(&mut self, id: &str) {
        if let Some(unit) = self.units.get_mut(id) {
            unit.status = MemoryStatus::Superseded;
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &MemoryUnit> {
        self.units.values()
    }

    pub fn rebuild(&mut self, mode: RebuildMode, fresh_units: Vec<MemoryUnit>) {
        match mode {
            RebuildMode::Full => {
                self.units.clear();
                for unit in fresh_units {
                    self.units.insert(unit.id.clone(), unit);
                }
            }
            RebuildMode::MissingOnly => {
                for unit in fresh_units {
                    self.units.entry(unit.id.clone()).or_insert(unit);
                }
            }
        }
    }

    pub fn retrieve(&self, query: &str, weights: RetrievalWeights, limit: usize, now: DateTime<Utc>) -> Vec<RankedHit> {
        retrieve(query, self.units.values(), weights, limit, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, content: &str, confidence: f64, age_days: i64) -> MemoryUnit {
        MemoryUnit {
            id: id.to_string(),
            content: content.to_string(),
            status: MemoryStatus::Active,
            confidence,
            updated_at: Utc::now() - chrono::Duration::days(age_days),
            retrievable: true,
        }
    }

    #[test]
    fn alias_expansion_matches_synonym() {
        let units = vec![unit("1", "uses postgres for storage", 0.8, 1)];
        let hits = retrieve("db config", units.iter(), RetrievalWeights::default(), 10, Utc::now());
        assert_eq!(hits.len(), 1);
        assert!(hits[0].lex_score > 0.0);
    }

    #[test]
    fn superseded_units_are_excluded() {
        let mut u = unit("1", "old fact", 0.9, 1);
        u.status = MemoryStatus::Superseded;
        let hits = retrieve("fact", vec![u].iter(), RetrievalWeights::default(), 10, Utc::now());
        assert!(hits.is_empty());
    }

    #[test]
    fn zero_overlap_still_qualifies_via_weak_floor() {
        let units = vec![unit("1", "completely unrelated text", 0.9, 0)];
        let hits = retrieve("xyzzy", units.iter(), RetrievalWeights::default(), 10, Utc::now());
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn weak_floor_ties_break_on_recency() {
        // Both candidates land on the same weak-semantic floor score since
        // neither overlaps the query lexically; the more recently updated
        // one must still win the tie.
        let units = vec![unit("older", "completely unrelated text", 0.1, 10), unit("newer", "completely unrelated text", 0.1, 1)];
        let hits = retrieve("xyzzy", units.iter(), RetrievalWeights::default(), 10, Utc::now());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(hits[0].id, "newer");
    }

    #[test]
    fn rebuild_missing_only_preserves_existing() {
        let mut store = MemoryStore::new();
        store.upsert_unit(unit("1", "kept", 0.5, 0));
        store.rebuild(RebuildMode::MissingOnly, vec![unit("1", "overwritten", 0.1, 0), unit("2", "new", 0.5, 0)]);
        assert_eq!(store.units().find(|u| u.id == "1").unwrap().content, "kept");
        assert!(store.units().any(|u| u.id == "2"));
    }
}
