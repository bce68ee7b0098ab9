use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::tokenize::tokenize_rouge;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Fragment {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl Fragment {
    fn from_counts(hits: usize, prediction_total: usize, reference_total: usize) -> Self {
        let precision = hits as f64 / prediction_total.max(1) as f64;
        let recall = hits as f64 / reference_total.max(1) as f64;
        Self {
            precision,
            recall,
            fmeasure: fmeasure(precision, recall),
        }
    }
}

fn fmeasure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Mean F-measures over all aligned pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RougeScore {
    pub rouge1: f64,
    pub rouge2: f64,
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    #[serde(rename = "rougeLsum")]
    pub rouge_lsum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairScores {
    pub rouge1: Fragment,
    pub rouge2: Fragment,
    pub rouge_l: Fragment,
    pub rouge_lsum: Fragment,
}

fn ngrams(tokens: &[String], order: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for window in tokens.windows(order) {
        *counts.entry(window).or_insert(0) += 1;
    }
    counts
}

pub fn rouge_n(prediction: &[String], reference: &[String], order: usize) -> Fragment {
    let prediction_counts = ngrams(prediction, order);
    let reference_counts = ngrams(reference, order);

    let hits = reference_counts
        .iter()
        .map(|(ngram, count)| (*count).min(prediction_counts.get(ngram).copied().unwrap_or(0)))
        .sum();

    Fragment::from_counts(
        hits,
        prediction_counts.values().sum(),
        reference_counts.values().sum(),
    )
}

fn lcs_table(reference: &[String], candidate: &[String]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; candidate.len() + 1]; reference.len() + 1];
    for i in 1..=reference.len() {
        for j in 1..=candidate.len() {
            table[i][j] = if reference[i - 1] == candidate[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

pub fn rouge_l(prediction: &[String], reference: &[String]) -> Fragment {
    if prediction.is_empty() || reference.is_empty() {
        return Fragment::default();
    }

    let lcs = lcs_table(reference, prediction)[reference.len()][prediction.len()];
    Fragment::from_counts(lcs, prediction.len(), reference.len())
}

/// Indices into `reference` of one longest common subsequence with `candidate`.
fn lcs_indices(reference: &[String], candidate: &[String]) -> Vec<usize> {
    let table = lcs_table(reference, candidate);
    let (mut i, mut j) = (reference.len(), candidate.len());
    let mut indices = Vec::new();

    while i > 0 && j > 0 {
        if reference[i - 1] == candidate[j - 1] {
            indices.push(i - 1);
            i -= 1;
            j -= 1;
        } else if table[i][j - 1] > table[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }

    indices.reverse();
    indices
}

/// Summary-level LCS: each reference sentence is matched against the union of its
/// LCS hits over all candidate sentences, with token budgets shared across sentences.
pub fn rouge_lsum(prediction: &[Vec<String>], reference: &[Vec<String>]) -> Fragment {
    let reference_total: usize = reference.iter().map(Vec::len).sum();
    let prediction_total: usize = prediction.iter().map(Vec::len).sum();
    if reference_total == 0 || prediction_total == 0 {
        return Fragment::default();
    }

    let mut reference_budget: HashMap<&str, usize> = HashMap::new();
    for token in reference.iter().flatten() {
        *reference_budget.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut prediction_budget: HashMap<&str, usize> = HashMap::new();
    for token in prediction.iter().flatten() {
        *prediction_budget.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut hits = 0usize;
    for sentence in reference {
        let union: BTreeSet<usize> = prediction
            .iter()
            .flat_map(|candidate| lcs_indices(sentence, candidate))
            .collect();

        for index in union {
            let token = sentence[index].as_str();
            let available_ref = reference_budget.get(token).copied().unwrap_or(0);
            let available_pred = prediction_budget.get(token).copied().unwrap_or(0);
            if available_ref > 0 && available_pred > 0 {
                hits += 1;
                reference_budget.insert(token, available_ref - 1);
                prediction_budget.insert(token, available_pred - 1);
            }
        }
    }

    Fragment::from_counts(hits, prediction_total, reference_total)
}

fn sentences(text: &str) -> Vec<Vec<String>> {
    text.split('\n')
        .map(tokenize_rouge)
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

/// Scores one prediction against its references, keeping the best F-measure per variant.
pub fn score_pair(prediction: &str, references: &[String]) -> PairScores {
    let prediction_tokens = tokenize_rouge(prediction);
    let prediction_sentences = sentences(prediction);

    let mut best = PairScores::default();
    for reference in references {
        let reference_tokens = tokenize_rouge(reference);
        let reference_sentences = sentences(reference);

        let candidate = PairScores {
            rouge1: rouge_n(&prediction_tokens, &reference_tokens, 1),
            rouge2: rouge_n(&prediction_tokens, &reference_tokens, 2),
            rouge_l: rouge_l(&prediction_tokens, &reference_tokens),
            rouge_lsum: rouge_lsum(&prediction_sentences, &reference_sentences),
        };

        if candidate.rouge1.fmeasure >= best.rouge1.fmeasure {
            best.rouge1 = candidate.rouge1;
        }
        if candidate.rouge2.fmeasure >= best.rouge2.fmeasure {
            best.rouge2 = candidate.rouge2;
        }
        if candidate.rouge_l.fmeasure >= best.rouge_l.fmeasure {
            best.rouge_l = candidate.rouge_l;
        }
        if candidate.rouge_lsum.fmeasure >= best.rouge_lsum.fmeasure {
            best.rouge_lsum = candidate.rouge_lsum;
        }
    }
    best
}

pub fn corpus_rouge(predictions: &[String], references: &[Vec<String>]) -> RougeScore {
    let pairs: Vec<PairScores> = predictions
        .iter()
        .zip(references)
        .map(|(prediction, candidates)| score_pair(prediction, candidates))
        .collect();

    if pairs.is_empty() {
        return RougeScore::default();
    }

    let count = pairs.len() as f64;
    let mean = |select: fn(&PairScores) -> f64| pairs.iter().map(select).sum::<f64>() / count;

    RougeScore {
        rouge1: mean(|pair| pair.rouge1.fmeasure),
        rouge2: mean(|pair| pair.rouge2.fmeasure),
        rouge_l: mean(|pair| pair.rouge_l.fmeasure),
        rouge_lsum: mean(|pair| pair.rouge_lsum.fmeasure),
    }
}
