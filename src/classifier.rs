use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::Deserialize;
use thiserror::Error;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tract_onnx::prelude::*;

use crate::config::Settings;

const DEFAULT_NUM_LABELS: usize = 2;

type RunnablePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read model architecture: {0}")]
    Architecture(String),
    #[error("failed to load tokenizer: {0}")]
    TokenizerLoad(String),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("tokenization failed: {0}")]
    Tokenize(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned {got} scores, expected {expected}")]
    OutputShape { expected: usize, got: usize },
}

/// Classification outcome: the arg-max class index and the full softmax
/// distribution it was taken from.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub predicted_class: usize,
    pub probabilities: Vec<f32>,
}

/// Seam between the HTTP layer and the model runtime.
pub trait TextClassifier: Send + Sync + 'static {
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError>;
}

/// Subset of the model-architecture descriptor (`config.json`) the service
/// applies: the classifier head's label table.
#[derive(Debug, Default, Deserialize)]
pub struct ModelArchitecture {
    #[serde(default)]
    id2label: HashMap<String, String>,
    #[serde(default)]
    num_labels: Option<usize>,
}

impl ModelArchitecture {
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClassifierError::Architecture(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClassifierError::Architecture(format!("{}: {}", path.display(), e)))
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels.unwrap_or_else(|| {
            if self.id2label.is_empty() {
                DEFAULT_NUM_LABELS
            } else {
                self.id2label.len()
            }
        })
    }

    /// Label names ordered by class index, with HuggingFace-style
    /// placeholders when the descriptor carries no table.
    pub fn labels(&self) -> Vec<String> {
        let mut indexed: Vec<(usize, String)> = self
            .id2label
            .iter()
            .filter_map(|(id, label)| id.parse().ok().map(|id: usize| (id, label.clone())))
            .collect();
        if indexed.is_empty() {
            return (0..self.num_labels())
                .map(|id| format!("LABEL_{}", id))
                .collect();
        }
        indexed.sort_by_key(|(id, _)| *id);
        indexed.into_iter().map(|(_, label)| label).collect()
    }
}

/// Tokenizer plus ONNX plan, loaded once at startup and shared read-only
/// across requests. Inference takes `&self`; no locking is involved.
pub struct SpamClassifier {
    plan: RunnablePlan,
    tokenizer: Tokenizer,
    input_count: usize,
    num_labels: usize,
    seq_len: usize,
}

impl SpamClassifier {
    pub fn load(settings: &Settings) -> Result<Self, ClassifierError> {
        let architecture = ModelArchitecture::from_file(&settings.model_config_path)?;
        let num_labels = architecture.num_labels();

        let tokenizer = load_tokenizer(&settings.tokenizer_path, settings.max_seq_len)?;
        log::info!(
            "Tokenizer loaded from {}",
            settings.tokenizer_path.display()
        );

        let (plan, input_count) = load_plan(&settings.model_path, settings.max_seq_len)?;
        log::info!(
            "Model loaded from {} ({} inputs, classes: {})",
            settings.model_path.display(),
            input_count,
            architecture.labels().join(", ")
        );

        Ok(SpamClassifier {
            plan,
            tokenizer,
            input_count,
            num_labels,
            seq_len: settings.max_seq_len,
        })
    }

    fn id_tensor(&self, values: &[u32]) -> Result<Tensor, ClassifierError> {
        let ids: Vec<i64> = values.iter().map(|&v| v as i64).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.seq_len), ids)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        Ok(array.into_tensor())
    }
}

impl TextClassifier for SpamClassifier {
    fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Tokenize(e.to_string()))?;

        let mut inputs: TVec<TValue> = tvec!(
            self.id_tensor(encoding.get_ids())?.into(),
            self.id_tensor(encoding.get_attention_mask())?.into(),
        );
        if self.input_count == 3 {
            inputs.push(self.id_tensor(encoding.get_type_ids())?.into());
        }

        let outputs = self
            .plan
            .run(inputs)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let view = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let logits: Array1<f32> = view.iter().copied().collect();
        if logits.len() != self.num_labels {
            return Err(ClassifierError::OutputShape {
                expected: self.num_labels,
                got: logits.len(),
            });
        }

        let probabilities = softmax(&logits);
        let predicted_class = argmax(&probabilities);

        Ok(Prediction {
            predicted_class,
            probabilities: probabilities.to_vec(),
        })
    }
}

fn load_tokenizer(path: &Path, max_seq_len: usize) -> Result<Tokenizer, ClassifierError> {
    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| ClassifierError::TokenizerLoad(e.to_string()))?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_seq_len,
            ..TruncationParams::default()
        }))
        .map_err(|e| ClassifierError::TokenizerLoad(e.to_string()))?;

    // Fixed-length padding keeps the model input shape static.
    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_seq_len),
        pad_id,
        ..PaddingParams::default()
    }));

    Ok(tokenizer)
}

fn load_plan(path: &Path, seq_len: usize) -> Result<(RunnablePlan, usize), ClassifierError> {
    let mut graph = onnx()
        .model_for_path(path)
        .map_err(|e| ClassifierError::ModelLoad(format!("{}: {}", path.display(), e)))?;

    // Sequence-classification exports carry input_ids and attention_mask,
    // optionally followed by token_type_ids.
    let input_count = graph.inputs.len();
    if !(2..=3).contains(&input_count) {
        return Err(ClassifierError::ModelLoad(format!(
            "expected 2 or 3 graph inputs, found {}",
            input_count
        )));
    }
    for index in 0..input_count {
        graph = graph
            .with_input_fact(
                index,
                InferenceFact::dt_shape(i64::datum_type(), tvec!(1, seq_len)),
            )
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
    }

    let plan = graph
        .into_optimized()
        .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
        .into_runnable()
        .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

    Ok((plan, input_count))
}

/// Numerically stable softmax: shift by the max logit before exponentiating.
fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value; ties resolve to the lowest index.
fn argmax(values: &Array1<f32>) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[UNK]": 0,
                "[PAD]": 1,
                "buy": 2,
                "now": 3,
                "limited": 4,
                "offer": 5
            },
            "unk_token": "[UNK]"
        }
    }"#;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(&array![1.0_f32, 3.0]);
        let sum: f32 = probs.sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[1] > probs[0]);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn softmax_survives_large_logits() {
        let probs = softmax(&array![1000.0_f32, 1001.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.sum() - 1.0).abs() < 1e-5);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn argmax_picks_largest_and_breaks_ties_low() {
        assert_eq!(argmax(&array![0.1_f32, 0.9]), 1);
        assert_eq!(argmax(&array![0.9_f32, 0.1]), 0);
        assert_eq!(argmax(&array![0.5_f32, 0.5]), 0);
    }

    #[test]
    fn architecture_reads_label_table() {
        let arch: ModelArchitecture =
            serde_json::from_str(r#"{ "id2label": { "0": "ham", "1": "spam" } }"#).unwrap();
        assert_eq!(arch.num_labels(), 2);
        assert_eq!(arch.labels(), vec!["ham".to_owned(), "spam".to_owned()]);
    }

    #[test]
    fn architecture_defaults_to_binary_placeholders() {
        let arch: ModelArchitecture = serde_json::from_str("{}").unwrap();
        assert_eq!(arch.num_labels(), 2);
        assert_eq!(
            arch.labels(),
            vec!["LABEL_0".to_owned(), "LABEL_1".to_owned()]
        );

        let arch: ModelArchitecture = serde_json::from_str(r#"{ "num_labels": 3 }"#).unwrap();
        assert_eq!(arch.num_labels(), 3);
    }

    #[test]
    fn architecture_from_file_reports_missing_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArchitecture::from_file(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::Architecture(_)));
    }

    #[test]
    fn tokenizer_loader_pads_and_truncates_to_fixed_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "tokenizer.json", TOKENIZER_JSON);

        let tokenizer = load_tokenizer(&path, 8).unwrap();

        let encoding = tokenizer.encode("Buy now limited offer", true).unwrap();
        assert_eq!(encoding.get_ids().len(), 8);
        assert_eq!(&encoding.get_ids()[..4], &[2, 3, 4, 5]);
        // Remainder is [PAD] (id 1), masked out.
        assert!(encoding.get_ids()[4..].iter().all(|&id| id == 1));
        assert_eq!(
            encoding.get_attention_mask(),
            &[1, 1, 1, 1, 0, 0, 0, 0][..]
        );

        let long = "buy now ".repeat(16);
        let encoding = tokenizer.encode(long.as_str(), true).unwrap();
        assert_eq!(encoding.get_ids().len(), 8);
        assert!(encoding.get_attention_mask().iter().all(|&m| m == 1));
    }

    #[test]
    fn load_fails_fast_on_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            bind_addr: "127.0.0.1:0".to_owned(),
            model_path: dir.path().join("model.onnx"),
            tokenizer_path: dir.path().join("tokenizer.json"),
            model_config_path: dir.path().join("config.json"),
            max_seq_len: 8,
            allowed_origins: Vec::new(),
        };
        assert!(matches!(
            SpamClassifier::load(&settings),
            Err(ClassifierError::Architecture(_))
        ));

        write_fixture(&dir, "config.json", r#"{ "id2label": { "0": "ham", "1": "spam" } }"#);
        assert!(matches!(
            SpamClassifier::load(&settings),
            Err(ClassifierError::TokenizerLoad(_))
        ));

        write_fixture(&dir, "tokenizer.json", TOKENIZER_JSON);
        assert!(matches!(
            SpamClassifier::load(&settings),
            Err(ClassifierError::ModelLoad(_))
        ));
    }
}
