use std::collections::HashMap;

use serde::Serialize;

use super::tokenize::tokenize_13a;

pub const MAX_ORDER: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BleuScore {
    pub bleu: f64,
    pub precisions: [f64; MAX_ORDER],
    pub brevity_penalty: f64,
    pub length_ratio: f64,
    pub translation_length: usize,
    pub reference_length: usize,
}

type NgramCounts = HashMap<Vec<String>, usize>;

fn ngram_counts(tokens: &[String], max_order: usize) -> NgramCounts {
    let mut counts = NgramCounts::new();
    for order in 1..=max_order {
        for window in tokens.windows(order) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
    }
    counts
}

/// Corpus BLEU over aligned predictions and reference lists, without smoothing.
///
/// Orders with no candidate n-grams anywhere in the corpus report precision 0 and are
/// left out of the geometric mean.
pub fn corpus_bleu(predictions: &[String], references: &[Vec<String>]) -> BleuScore {
    let mut matches_by_order = [0usize; MAX_ORDER];
    let mut possible_by_order = [0usize; MAX_ORDER];
    let mut translation_length = 0usize;
    let mut reference_length = 0usize;

    for (prediction, candidates) in predictions.iter().zip(references) {
        let translation = tokenize_13a(prediction);
        let tokenized_refs: Vec<Vec<String>> =
            candidates.iter().map(|text| tokenize_13a(text)).collect();

        reference_length += tokenized_refs.iter().map(Vec::len).min().unwrap_or(0);
        translation_length += translation.len();

        let mut merged_ref_counts = NgramCounts::new();
        for reference in &tokenized_refs {
            for (ngram, count) in ngram_counts(reference, MAX_ORDER) {
                let entry = merged_ref_counts.entry(ngram).or_insert(0);
                *entry = (*entry).max(count);
            }
        }

        for (ngram, count) in ngram_counts(&translation, MAX_ORDER) {
            let clipped = count.min(merged_ref_counts.get(&ngram).copied().unwrap_or(0));
            matches_by_order[ngram.len() - 1] += clipped;
        }

        for order in 1..=MAX_ORDER {
            if translation.len() >= order {
                possible_by_order[order - 1] += translation.len() - order + 1;
            }
        }
    }

    let mut precisions = [0.0; MAX_ORDER];
    for index in 0..MAX_ORDER {
        if possible_by_order[index] > 0 {
            precisions[index] = matches_by_order[index] as f64 / possible_by_order[index] as f64;
        }
    }

    let attainable: Vec<f64> = (0..MAX_ORDER)
        .filter(|index| possible_by_order[*index] > 0)
        .map(|index| precisions[index])
        .collect();

    let geo_mean = if !attainable.is_empty() && attainable.iter().all(|p| *p > 0.0) {
        let weight = 1.0 / attainable.len() as f64;
        attainable.iter().map(|p| weight * p.ln()).sum::<f64>().exp()
    } else {
        0.0
    };

    let length_ratio = if reference_length == 0 {
        0.0
    } else {
        translation_length as f64 / reference_length as f64
    };
    let brevity_penalty = if length_ratio > 1.0 {
        1.0
    } else if length_ratio == 0.0 {
        0.0
    } else {
        (1.0 - 1.0 / length_ratio).exp()
    };

    BleuScore {
        bleu: geo_mean * brevity_penalty,
        precisions,
        brevity_penalty,
        length_ratio,
        translation_length,
        reference_length,
    }
}
