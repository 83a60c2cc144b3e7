use std::collections::HashMap;

use tantivy::tokenizer::TextAnalyzer;

use statrag_core::types::{ChunkId, SearchHit, SourceKind};

use crate::analyzer::{build_analyzer, tokenize};

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Clone, Debug)]
struct Entry {
	seq: u64,
	doc_id: String,
	len: u32,
	terms: HashMap<String, u32>,
}

/// In-memory inverted index ranked with BM25.
///
/// Cloning yields an independent copy, which is how the engine builds the
/// next index generation without touching the one readers are using.
#[derive(Clone)]
pub struct KeywordIndex {
	analyzer: TextAnalyzer,
	entries: HashMap<ChunkId, Entry>,
	postings: HashMap<String, HashMap<ChunkId, u32>>,
	by_doc: HashMap<String, Vec<ChunkId>>,
	total_len: u64,
	next_seq: u64,
}

impl Default for KeywordIndex {
	fn default() -> Self { Self::new() }
}

impl KeywordIndex {
	pub fn new() -> Self {
		Self { analyzer: build_analyzer(), entries: HashMap::new(), postings: HashMap::new(), by_doc: HashMap::new(), total_len: 0, next_seq: 0 }
	}

	/// Tokenizes `text` and inserts its postings, replacing any previous entry for `chunk_id`.
	pub fn index(&mut self, chunk_id: &str, doc_id: &str, text: &str) {
		self.remove(chunk_id);
		let tokens = tokenize(&mut self.analyzer, text);
		let mut terms: HashMap<String, u32> = HashMap::new();
		for t in tokens.iter() { *terms.entry(t.clone()).or_default() += 1; }
		for (term, tf) in &terms { self.postings.entry(term.clone()).or_default().insert(chunk_id.to_string(), *tf); }
		let len = tokens.len() as u32;
		self.total_len += u64::from(len);
		self.by_doc.entry(doc_id.to_string()).or_default().push(chunk_id.to_string());
		self.entries.insert(chunk_id.to_string(), Entry { seq: self.next_seq, doc_id: doc_id.to_string(), len, terms });
		self.next_seq += 1;
	}

	/// Removes all postings for `chunk_id`. Returns false when it was not indexed.
	pub fn remove(&mut self, chunk_id: &str) -> bool {
		let Some(entry) = self.entries.remove(chunk_id) else { return false };
		for term in entry.terms.keys() {
			if let Some(list) = self.postings.get_mut(term) {
				list.remove(chunk_id);
				if list.is_empty() { self.postings.remove(term); }
			}
		}
		self.total_len -= u64::from(entry.len);
		if let Some(ids) = self.by_doc.get_mut(&entry.doc_id) {
			ids.retain(|id| id != chunk_id);
			if ids.is_empty() { self.by_doc.remove(&entry.doc_id); }
		}
		true
	}

	/// Removes every chunk of `doc_id`; returns how many were removed.
	pub fn remove_document(&mut self, doc_id: &str) -> usize {
		let ids = self.by_doc.get(doc_id).cloned().unwrap_or_default();
		ids.iter().filter(|id| self.remove(id)).count()
	}

	/// Ranks chunks by BM25 against the query terms. Ties keep insertion order.
	/// An empty or stop-word-only query yields no hits.
	pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
		let mut analyzer = self.analyzer.clone();
		let mut terms = tokenize(&mut analyzer, query);
		terms.sort();
		terms.dedup();
		if terms.is_empty() || top_k == 0 || self.entries.is_empty() { return Vec::new(); }

		let n = self.entries.len() as f32;
		let avg_len = (self.total_len as f32 / n).max(1.0);
		let mut scores: HashMap<&str, f32> = HashMap::new();
		for term in &terms {
			let Some(list) = self.postings.get(term) else { continue };
			let df = list.len() as f32;
			let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
			for (chunk_id, &tf) in list {
				let len = self.entries.get(chunk_id).map_or(0.0, |e| e.len as f32);
				let tf = tf as f32;
				let norm = tf + K1 * (1.0 - B + B * len / avg_len);
				*scores.entry(chunk_id.as_str()).or_default() += idf * tf * (K1 + 1.0) / norm;
			}
		}

		let mut ranked: Vec<(&str, f32, u64)> = scores
			.into_iter()
			.map(|(id, score)| (id, score, self.entries.get(id).map_or(u64::MAX, |e| e.seq)))
			.collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
		ranked.truncate(top_k);
		ranked.into_iter().map(|(id, score, _)| SearchHit { id: id.to_string(), score, source: SourceKind::Text }).collect()
	}

	pub fn contains(&self, chunk_id: &str) -> bool { self.entries.contains_key(chunk_id) }

	pub fn chunk_ids_for(&self, doc_id: &str) -> &[ChunkId] { self.by_doc.get(doc_id).map(Vec::as_slice).unwrap_or(&[]) }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ranks_term_frequency_and_rarity() {
		let mut idx = KeywordIndex::new();
		idx.index("a:0", "a", "t-test basics: the t-test compares two means");
		idx.index("b:0", "b", "ANOVA overview compares many means");
		idx.index("c:0", "c", "regression intro");
		let hits = idx.search("t-test", 10);
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].id, "a:0");
		let hits = idx.search("means", 10);
		assert_eq!(hits.len(), 2);
	}

	#[test]
	fn ties_follow_insertion_order() {
		let mut idx = KeywordIndex::new();
		idx.index("z:0", "z", "variance");
		idx.index("a:0", "a", "variance");
		idx.index("m:0", "m", "variance");
		let ids: Vec<_> = idx.search("variance", 10).into_iter().map(|h| h.id).collect();
		assert_eq!(ids, vec!["z:0", "a:0", "m:0"]);
	}

	#[test]
	fn empty_and_stop_word_queries_return_nothing() {
		let mut idx = KeywordIndex::new();
		idx.index("a:0", "a", "the mean of the sample");
		assert!(idx.search("", 5).is_empty());
		assert!(idx.search("the of", 5).is_empty());
	}

	#[test]
	fn remove_drops_all_postings() {
		let mut idx = KeywordIndex::new();
		idx.index("a:0", "a", "kruskal wallis");
		idx.index("a:1", "a", "wallis test");
		idx.index("b:0", "b", "wallis");
		assert_eq!(idx.remove_document("a"), 2);
		assert!(!idx.contains("a:0"));
		let ids: Vec<_> = idx.search("wallis kruskal", 5).into_iter().map(|h| h.id).collect();
		assert_eq!(ids, vec!["b:0"]);
		assert!(!idx.remove("a:0"));
		assert_eq!(idx.len(), 1);
	}

	#[test]
	fn reindexing_a_chunk_replaces_its_terms() {
		let mut idx = KeywordIndex::new();
		idx.index("a:0", "a", "logistic regression");
		idx.index("a:0", "a", "poisson regression");
		assert!(idx.search("logistic", 5).is_empty());
		assert_eq!(idx.search("poisson", 5).len(), 1);
		assert_eq!(idx.chunk_ids_for("a"), ["a:0".to_string()]);
	}
}
