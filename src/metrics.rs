use std::collections::HashMap;

/// Aggregate skew metrics for per-document selection counts.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionSkew {
    /// Total draws observed.
    pub total: usize,
    /// Documents in the corpus, drawn or not.
    pub documents: usize,
    /// Fewest draws of any document.
    pub min: usize,
    /// Most draws of any document.
    pub max: usize,
    /// Mean draws per document.
    pub mean: f64,
    /// Share of draws taken by the most drawn document.
    pub max_share: f64,
    /// Share of draws taken by the least drawn document.
    pub min_share: f64,
    /// `max / min`; infinite when some document was never drawn.
    pub ratio: f64,
    /// Largest absolute gap between any document's share and the uniform share `1/N`.
    pub max_uniform_deviation: f64,
    /// Per-document breakdown, most drawn first.
    pub per_document: Vec<DocumentShare>,
}

/// One document's share of the observed draws.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentShare {
    /// Document index in the corpus.
    pub index: usize,
    /// Times the document was drawn.
    pub count: usize,
    /// Fraction of all draws.
    pub share: f64,
}

/// Compute skew metrics over `document_count` documents from observed draw counts.
///
/// Documents missing from `counts` are treated as drawn zero times, so a
/// never-selected document still shows up in `min` and `ratio`.
pub fn selection_skew(
    counts: &HashMap<usize, usize>,
    document_count: usize,
) -> Option<SelectionSkew> {
    if document_count == 0 {
        return None;
    }
    let per_index: Vec<usize> = (0..document_count)
        .map(|index| counts.get(&index).copied().unwrap_or(0))
        .collect();
    let total: usize = per_index.iter().sum();
    let min = per_index.iter().copied().min().unwrap_or(0);
    let max = per_index.iter().copied().max().unwrap_or(0);
    let share_of = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let uniform = 1.0 / document_count as f64;
    let ratio = if min == 0 {
        f64::INFINITY
    } else {
        max as f64 / min as f64
    };
    let mut per_document: Vec<DocumentShare> = per_index
        .iter()
        .enumerate()
        .map(|(index, &count)| DocumentShare {
            index,
            count,
            share: share_of(count),
        })
        .collect();
    let max_uniform_deviation = per_document
        .iter()
        .map(|entry| (entry.share - uniform).abs())
        .fold(0.0, f64::max);
    per_document.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.index.cmp(&b.index)));
    Some(SelectionSkew {
        total,
        documents: document_count,
        min,
        max,
        mean: total as f64 / document_count as f64,
        max_share: share_of(max),
        min_share: share_of(min),
        ratio,
        max_uniform_deviation,
        per_document,
    })
}
