//! Okapi BM25 term statistics, fitted in memory over one document set.

use std::collections::HashMap;

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// Case-folded word-boundary tokenizer. The same tokenizer runs at index
/// build and at query time; scores are meaningless otherwise.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            for lc in c.to_lowercase() {
                current.push(lc);
            }
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Fitted model: per-document term frequencies plus corpus-wide inverse
/// document frequencies. Rebuilt wholesale, never updated in place.
#[derive(Debug)]
pub struct Bm25 {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_len: Vec<f32>,
    avg_len: f32,
    idf: HashMap<String, f32>,
}

impl Bm25 {
    pub fn fit(docs: &[Vec<String>]) -> Self {
        let n = docs.len();
        let mut term_freqs = Vec::with_capacity(n);
        let mut doc_len = Vec::with_capacity(n);
        let mut df: HashMap<String, u32> = HashMap::new();

        for tokens in docs {
            let mut tf: HashMap<String, u32> = HashMap::new();
            for t in tokens {
                *tf.entry(t.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_len.push(tokens.len() as f32);
            term_freqs.push(tf);
        }

        let avg_len = if n == 0 { 0.0 } else { doc_len.iter().sum::<f32>() / n as f32 };
        // ln(1 + x) keeps idf non-negative even for terms present in most
        // documents.
        let idf = df
            .into_iter()
            .map(|(term, d)| {
                let x = (n as f32 - d as f32 + 0.5) / (d as f32 + 0.5);
                (term, (1.0 + x).ln())
            })
            .collect();

        Self { term_freqs, doc_len, avg_len, idf }
    }

    pub fn doc_count(&self) -> usize {
        self.term_freqs.len()
    }

    /// One score per fitted document, aligned with the fit order. Higher is
    /// better; the range is unbounded. An empty model scores nothing.
    pub fn scores(&self, query: &[String]) -> Vec<f32> {
        let mut out = vec![0.0f32; self.term_freqs.len()];
        for term in query {
            let Some(idf) = self.idf.get(term) else { continue };
            for (i, tf_map) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = tf_map.get(term) else { continue };
                let tf = tf as f32;
                let denom = tf + K1 * (1.0 - B + B * self.doc_len[i] / self.avg_len);
                out[i] += idf * tf * (K1 + 1.0) / denom;
            }
        }
        out
    }
}
