use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::extract::LineExtractor;
use crate::util::{ensure_directory, utc_compact_string};

pub mod bleu;
pub mod rouge;
mod tokenize;

pub use bleu::{BleuScore, corpus_bleu};
pub use rouge::{RougeScore, corpus_rouge};

pub const RESULTS_STEM: &str = "metrics_results";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsResult {
    pub pairs_scored: usize,
    pub bleu: BleuScore,
    pub rouge: RougeScore,
}

/// Line corpora truncated to a common length, references wrapped one per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedCorpus {
    pub predictions: Vec<String>,
    pub references: Vec<Vec<String>>,
}

impl AlignedCorpus {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Pairs line i of the hypothesis with line i of the reference; the longer tail is dropped.
pub fn align(mut hypothesis: Vec<String>, mut reference: Vec<String>) -> AlignedCorpus {
    let common = hypothesis.len().min(reference.len());
    let dropped_hypothesis = hypothesis.len() - common;
    let dropped_reference = reference.len() - common;
    if dropped_hypothesis > 0 || dropped_reference > 0 {
        debug!(
            pairs = common,
            dropped_hypothesis,
            dropped_reference,
            "truncated corpora to common length"
        );
    }

    hypothesis.truncate(common);
    reference.truncate(common);

    AlignedCorpus {
        predictions: hypothesis,
        references: reference.into_iter().map(|line| vec![line]).collect(),
    }
}

pub fn score_corpora(hypothesis: Vec<String>, reference: Vec<String>) -> MetricsResult {
    let aligned = align(hypothesis, reference);
    if aligned.is_empty() {
        warn!("no aligned lines to score");
    }
    MetricsResult {
        pairs_scored: aligned.len(),
        bleu: corpus_bleu(&aligned.predictions, &aligned.references),
        rouge: corpus_rouge(&aligned.predictions, &aligned.references),
    }
}

pub fn score_documents(
    extractor: &dyn LineExtractor,
    hypothesis: &Path,
    reference: &Path,
) -> Result<MetricsResult> {
    let hypothesis_lines = extractor
        .extract_lines(hypothesis)
        .with_context(|| format!("failed to extract hypothesis {}", hypothesis.display()))?;
    let reference_lines = extractor
        .extract_lines(reference)
        .with_context(|| format!("failed to extract reference {}", reference.display()))?;

    info!(
        hypothesis_lines = hypothesis_lines.len(),
        reference_lines = reference_lines.len(),
        "scoring documents"
    );

    Ok(score_corpora(hypothesis_lines, reference_lines))
}

impl MetricsResult {
    /// `(Metric, Score)` rows in table order.
    pub fn rows(&self) -> Vec<(String, String)> {
        let precisions = self
            .bleu
            .precisions
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        vec![
            ("BLEU".to_string(), self.bleu.bleu.to_string()),
            ("Precisions (n-gram 1-4)".to_string(), format!("[{precisions}]")),
            ("Brevity Penalty".to_string(), self.bleu.brevity_penalty.to_string()),
            ("Length Ratio".to_string(), self.bleu.length_ratio.to_string()),
            (
                "Translation Length".to_string(),
                self.bleu.translation_length.to_string(),
            ),
            (
                "Reference Length".to_string(),
                self.bleu.reference_length.to_string(),
            ),
            ("ROUGE-1".to_string(), self.rouge.rouge1.to_string()),
            ("ROUGE-2".to_string(), self.rouge.rouge2.to_string()),
            ("ROUGE-L".to_string(), self.rouge.rouge_l.to_string()),
            ("ROUGE-LSum".to_string(), self.rouge.rouge_lsum.to_string()),
            ("Pairs Scored".to_string(), self.pairs_scored.to_string()),
        ]
    }
}

pub fn results_path(results_dir: &Path, timestamp: Option<DateTime<Utc>>) -> PathBuf {
    match timestamp {
        Some(ts) => results_dir.join(format!("{RESULTS_STEM}_{}.csv", utc_compact_string(ts))),
        None => results_dir.join(format!("{RESULTS_STEM}.csv")),
    }
}

pub fn write_table(result: &MetricsResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create metrics table: {}", path.display()))?;
    writer
        .write_record(["Metric", "Score"])
        .with_context(|| format!("failed to write metrics table: {}", path.display()))?;
    for (metric, score) in result.rows() {
        writer
            .write_record([metric.as_str(), score.as_str()])
            .with_context(|| format!("failed to write metrics table: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush metrics table: {}", path.display()))?;

    info!(path = %path.display(), "wrote metrics table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::document::write_pdf;
    use crate::extract::{DocumentExtractor, pdftotext_version};

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn align_truncates_to_shorter_corpus_in_order() {
        let hypothesis = lines(&["h1", "h2", "h3", "h4", "h5"]);
        let reference = lines(&["r1", "r2", "r3"]);

        let aligned = align(hypothesis, reference);
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned.predictions, lines(&["h1", "h2", "h3"]));
        assert_eq!(
            aligned.references,
            vec![vec!["r1".to_string()], vec!["r2".to_string()], vec!["r3".to_string()]]
        );
    }

    #[test]
    fn align_handles_every_length_combination() {
        for m in 0..5 {
            for n in 0..5 {
                let hypothesis: Vec<String> = (0..m).map(|i| format!("h{i}")).collect();
                let reference: Vec<String> = (0..n).map(|i| format!("r{i}")).collect();
                let aligned = align(hypothesis.clone(), reference.clone());

                assert_eq!(aligned.len(), m.min(n));
                assert_eq!(aligned.predictions[..], hypothesis[..m.min(n)]);
                for (index, wrapped) in aligned.references.iter().enumerate() {
                    assert_eq!(wrapped, &vec![reference[index].clone()]);
                }
            }
        }
    }

    #[test]
    fn identical_corpora_score_perfectly() {
        let corpus = lines(&["the cat sat", "on the mat"]);
        let result = score_corpora(corpus.clone(), corpus);

        assert_eq!(result.pairs_scored, 2);
        assert_eq!(result.bleu.bleu, 1.0);
        assert_eq!(result.rouge.rouge1, 1.0);
        assert_eq!(result.rouge.rouge2, 1.0);
        assert_eq!(result.rouge.rouge_l, 1.0);
        assert_eq!(result.rouge.rouge_lsum, 1.0);
    }

    #[test]
    fn extra_hypothesis_lines_are_ignored() {
        let hypothesis = lines(&["the cat sat", "on the mat", "x", "y", "z"]);
        let reference = lines(&["the cat sat", "on the mat", "x"]);

        let result = score_corpora(hypothesis, reference);
        assert_eq!(result.pairs_scored, 3);
        assert_eq!(result.rouge.rouge1, 1.0);
    }

    #[test]
    fn results_path_optionally_carries_timestamp() {
        let dir = Path::new("results");
        assert_eq!(results_path(dir, None), dir.join("metrics_results.csv"));

        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:20:30Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        assert_eq!(
            results_path(dir, Some(ts)),
            dir.join("metrics_results_20240501T102030Z.csv")
        );
    }

    #[test]
    fn write_table_persists_metric_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("metrics_results.csv");
        let corpus = lines(&["the cat sat", "on the mat"]);
        let result = score_corpora(corpus.clone(), corpus);

        write_table(&result, &path).expect("write table");
        let table = fs::read_to_string(&path).expect("read table");
        let rows: Vec<&str> = table.lines().collect();

        assert_eq!(rows[0], "Metric,Score");
        assert_eq!(rows[1], "BLEU,1");
        assert_eq!(rows[2], "Precisions (n-gram 1-4),\"[1, 1, 1, 0]\"");
        assert!(rows.contains(&"ROUGE-LSum,1"));
        assert_eq!(rows.len(), 12);
    }

    #[test]
    fn score_documents_reads_text_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let hypothesis = dir.path().join("hypothesis.txt");
        let reference = dir.path().join("reference.txt");
        fs::write(&hypothesis, "the cat sat\n\non the mat\nextra line\n").expect("write");
        fs::write(&reference, "the cat sat\non the mat\n").expect("write");

        let result = score_documents(&DocumentExtractor, &hypothesis, &reference).expect("score");
        assert_eq!(result.pairs_scored, 2);
        assert_eq!(result.bleu.bleu, 1.0);
    }

    #[test]
    fn score_documents_propagates_missing_reference() {
        let dir = tempfile::tempdir().expect("tempdir");
        let hypothesis = dir.path().join("hypothesis.txt");
        fs::write(&hypothesis, "line").expect("write");

        assert!(
            score_documents(&DocumentExtractor, &hypothesis, &dir.path().join("missing.pdf"))
                .is_err()
        );
    }

    #[test]
    fn generated_pdf_scores_against_its_source_text() {
        if pdftotext_version().is_none() {
            eprintln!("skipping: pdftotext is not installed");
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let hypothesis = dir.path().join("hypothesis.pdf");
        let reference = dir.path().join("reference.txt");
        let text = "the cat sat on the mat\nthe dog lay by the door";
        write_pdf(text, &hypothesis, None).expect("write pdf");
        fs::write(&reference, text).expect("write reference");

        let result = score_documents(&DocumentExtractor, &hypothesis, &reference).expect("score");
        assert_eq!(result.pairs_scored, 2);
        assert_eq!(result.bleu.bleu, 1.0);
        assert_eq!(result.rouge.rouge_lsum, 1.0);
    }
}
