//! Pre-trained risk model and the adapter the pipeline calls.
//!
//! The model is loaded once at startup and shared read-only behind an `Arc`;
//! nothing here mutates it after construction, so concurrent `classify` calls
//! need no locking.

use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::models::{ClassProbabilities, FeatureVector, FEATURE_COUNT, MAX_BUCKET, RISK_CLASS_COUNT};

/// Inference backend for a trained classifier.
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &str;

    fn input_width(&self) -> usize;

    fn output_width(&self) -> usize;

    /// Single forward pass, no state carried between calls.
    fn predict(&self, features: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

/// Fully connected layer. `weights[j]` holds the input weights of unit `j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    fn input_width(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn output_width(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output: Vec<f32> = self
            .weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        apply_activation(self.activation, &mut output);
        output
    }
}

fn apply_activation(activation: Activation, values: &mut [f32]) {
    match activation {
        Activation::Linear => {}
        Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
        Activation::Sigmoid => values.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
        Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
        Activation::Softmax => {
            let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            values.iter_mut().for_each(|v| *v = (*v - max).exp());
            let sum: f32 = values.iter().sum();
            if sum > 0.0 {
                values.iter_mut().for_each(|v| *v /= sum);
            }
        }
    }
}

/// Feed-forward network exported from training as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub name: String,
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = read_to_string(path)
            .map_err(|err| ClassifierError::ModelLoad(format!("{}: {err}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let network: DenseNetwork =
            serde_json::from_str(raw).map_err(|err| ClassifierError::ModelLoad(err.to_string()))?;
        network.check_shapes()?;
        Ok(network)
    }

    fn check_shapes(&self) -> Result<(), ClassifierError> {
        if self.layers.is_empty() {
            return Err(ClassifierError::ModelLoad("model has no layers".to_string()));
        }

        let mut expected_input = self.layers[0].input_width();
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.output_width() == 0 || layer.input_width() == 0 {
                return Err(ClassifierError::ModelLoad(format!("layer {index} is empty")));
            }
            if layer.weights.iter().any(|row| row.len() != expected_input) {
                return Err(ClassifierError::ModelLoad(format!(
                    "layer {index} expects {expected_input} inputs on every unit"
                )));
            }
            if layer.bias.len() != layer.output_width() {
                return Err(ClassifierError::ModelLoad(format!(
                    "layer {index} has {} units but {} biases",
                    layer.output_width(),
                    layer.bias.len()
                )));
            }
            expected_input = layer.output_width();
        }

        Ok(())
    }
}

impl RiskModel for DenseNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_width)
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::output_width)
    }

    fn predict(&self, features: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        if features.len() != self.input_width() {
            return Err(ClassifierError::Inference(format!(
                "expected {} features, got {}",
                self.input_width(),
                features.len()
            )));
        }
        let output = self
            .layers
            .iter()
            .fold(features.to_vec(), |input, layer| layer.forward(&input));
        Ok(output)
    }
}

/// Adapter between encoded feature vectors and a loaded risk model.
#[derive(Clone)]
pub struct RiskClassifier {
    model: Arc<dyn RiskModel>,
}

impl RiskClassifier {
    pub fn new(model: Arc<dyn RiskModel>) -> Result<Self, ClassifierError> {
        if model.input_width() != FEATURE_COUNT {
            return Err(ClassifierError::ModelLoad(format!(
                "model `{}` takes {} inputs, expected {FEATURE_COUNT}",
                model.name(),
                model.input_width()
            )));
        }
        if model.output_width() != RISK_CLASS_COUNT {
            return Err(ClassifierError::ModelLoad(format!(
                "model `{}` produces {} classes, expected {RISK_CLASS_COUNT}",
                model.name(),
                model.output_width()
            )));
        }
        Ok(Self { model })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let network = DenseNetwork::load(path)?;
        tracing::info!(
            model = %network.name,
            layers = network.layers.len(),
            "risk model loaded"
        );
        Self::new(Arc::new(network))
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<ClassProbabilities, ClassifierError> {
        let input = features.as_slice();
        if input.len() != self.model.input_width() {
            return Err(ClassifierError::Inference(format!(
                "vector has {} features, model takes {}",
                input.len(),
                self.model.input_width()
            )));
        }
        if let Some((position, value)) = input.iter().enumerate().find(|(_, &v)| v > MAX_BUCKET) {
            return Err(ClassifierError::Inference(format!(
                "feature {position} has category {value}, outside 0..={MAX_BUCKET}"
            )));
        }

        let output = self.model.predict(&features.to_model_input())?;
        let probabilities: [f32; RISK_CLASS_COUNT] = output.as_slice().try_into().map_err(|_| {
            ClassifierError::Inference(format!(
                "model returned {} values, expected {RISK_CLASS_COUNT}",
                output.len()
            ))
        })?;
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ClassifierError::Inference(
                "model returned a non-finite probability".to_string(),
            ));
        }

        Ok(ClassProbabilities(probabilities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_MODEL: &str = r#"{
        "name": "tiny",
        "layers": [
            {
                "weights": [
                    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
                    [0, 1, 1, 1, 1, 1, 1, 1, 1, 1]
                ],
                "bias": [0, 0],
                "activation": "relu"
            },
            {
                "weights": [[-1, -1], [0, 0], [1, 1]],
                "bias": [0, 0, 0],
                "activation": "softmax"
            }
        ]
    }"#;

    struct FixedModel {
        width: usize,
        output: Vec<f32>,
    }

    impl RiskModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn input_width(&self) -> usize {
            self.width
        }

        fn output_width(&self) -> usize {
            RISK_CLASS_COUNT
        }

        fn predict(&self, _features: &[f32]) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.output.clone())
        }
    }

    #[test]
    fn softmax_output_is_a_distribution() {
        let network = DenseNetwork::from_json(TINY_MODEL).expect("model");
        let classifier = RiskClassifier::new(Arc::new(network)).expect("classifier");
        let probabilities = classifier
            .classify(&FeatureVector([1, 1, 2, 2, 2, 2, 1, 0, 2, 2]))
            .expect("classify");
        let sum: f32 = probabilities.0.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probabilities.0[2] > probabilities.0[0]);
    }

    #[test]
    fn all_zero_vector_is_uniform() {
        let network = DenseNetwork::from_json(TINY_MODEL).expect("model");
        let classifier = RiskClassifier::new(Arc::new(network)).expect("classifier");
        let probabilities = classifier.classify(&FeatureVector([0; 10])).expect("classify");
        for p in probabilities.0 {
            assert!((p - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn load_model_from_json_file() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("model.json");
        std::fs::write(&path, TINY_MODEL).expect("write");
        let classifier = RiskClassifier::from_path(&path).expect("load");
        assert_eq!(classifier.model_name(), "tiny");
    }

    #[test]
    fn bundled_model_loads_and_ranks_extremes() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/models/cardio_risk.json");
        let classifier = RiskClassifier::from_path(path).expect("bundled model");

        let healthy = classifier.classify(&FeatureVector([0; 10])).expect("classify");
        assert!(healthy.0[0] > healthy.0[1] && healthy.0[0] > healthy.0[2]);

        let loaded = classifier
            .classify(&FeatureVector([1, 1, 2, 2, 2, 2, 1, 0, 2, 2]))
            .expect("classify");
        assert!(loaded.0[2] > loaded.0[0] && loaded.0[2] > loaded.0[1]);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let err = RiskClassifier::from_path(tmp.path().join("absent.json")).err();
        assert!(matches!(err, Some(ClassifierError::ModelLoad(_))));
    }

    #[test]
    fn ragged_layers_are_rejected_at_load() {
        let raw = r#"{"name": "bad", "layers": [
            {"weights": [[1, 2], [3]], "bias": [0, 0], "activation": "linear"}
        ]}"#;
        assert!(matches!(
            DenseNetwork::from_json(raw),
            Err(ClassifierError::ModelLoad(_))
        ));

        let raw = r#"{"name": "bad", "layers": [
            {"weights": [[1, 2]], "bias": [0, 0], "activation": "linear"}
        ]}"#;
        assert!(matches!(
            DenseNetwork::from_json(raw),
            Err(ClassifierError::ModelLoad(_))
        ));

        assert!(matches!(
            DenseNetwork::from_json(r#"{"name": "empty", "layers": []}"#),
            Err(ClassifierError::ModelLoad(_))
        ));
    }

    #[test]
    fn wrong_model_shape_is_a_load_error() {
        let model = FixedModel {
            width: 9,
            output: vec![0.2, 0.3, 0.5],
        };
        assert!(matches!(
            RiskClassifier::new(Arc::new(model)),
            Err(ClassifierError::ModelLoad(_))
        ));
    }

    #[test]
    fn out_of_domain_category_is_an_inference_error() {
        let model = FixedModel {
            width: FEATURE_COUNT,
            output: vec![0.2, 0.3, 0.5],
        };
        let classifier = RiskClassifier::new(Arc::new(model)).expect("classifier");
        let err = classifier
            .classify(&FeatureVector([0, 0, 0, 3, 0, 0, 0, 0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
    }

    #[test]
    fn malformed_model_output_is_an_inference_error() {
        let short = FixedModel {
            width: FEATURE_COUNT,
            output: vec![1.0],
        };
        let classifier = RiskClassifier::new(Arc::new(short)).expect("classifier");
        assert!(matches!(
            classifier.classify(&FeatureVector([0; 10])),
            Err(ClassifierError::Inference(_))
        ));

        let nan = FixedModel {
            width: FEATURE_COUNT,
            output: vec![f32::NAN, 0.5, 0.5],
        };
        let classifier = RiskClassifier::new(Arc::new(nan)).expect("classifier");
        assert!(matches!(
            classifier.classify(&FeatureVector([0; 10])),
            Err(ClassifierError::Inference(_))
        ));
    }

    #[test]
    fn classifier_is_shared_across_threads() {
        let network = DenseNetwork::from_json(TINY_MODEL).expect("model");
        let classifier = RiskClassifier::new(Arc::new(network)).expect("classifier");
        let expected = classifier.classify(&FeatureVector([2; 10])).expect("classify");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let classifier = classifier.clone();
                std::thread::spawn(move || classifier.classify(&FeatureVector([2; 10])))
            })
            .collect();
        for handle in handles {
            let probabilities = handle.join().expect("thread").expect("classify");
            assert_eq!(probabilities, expected);
        }
    }
}
