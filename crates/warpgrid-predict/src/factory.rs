//! Family tag → predictor.
//!
//! This is the one place that knows every algorithm family. Adding a
//! family means adding a match arm here and a tag in `supported_families`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use warpgrid_forecast::{ModelConfig, TYPE_GRU, TYPE_LINEAR};

use crate::error::{PredictError, PredictResult};
use crate::gru::GruPredictor;
use crate::linear::LinearPredictor;
use crate::predictor::Predictor;
use crate::runner::AlgorithmRunner;

pub struct PredictorFactory {
    runner: Arc<dyn AlgorithmRunner>,
    algorithms_dir: PathBuf,
}

impl PredictorFactory {
    /// `algorithms_dir` is where the per-family unit directories live.
    pub fn new(runner: Arc<dyn AlgorithmRunner>, algorithms_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            algorithms_dir: algorithms_dir.into(),
        }
    }

    pub fn algorithms_dir(&self) -> &Path {
        &self.algorithms_dir
    }

    /// Tags this factory can build.
    pub fn supported_families() -> &'static [&'static str] {
        &[TYPE_GRU, TYPE_LINEAR]
    }

    /// Build the predictor for `model.kind`, or `None` for an unknown tag.
    pub fn new_predictor(&self, model: &ModelConfig) -> Option<Box<dyn Predictor>> {
        let runner = Arc::clone(&self.runner);
        let predictor: Box<dyn Predictor> = match model.kind.as_str() {
            TYPE_GRU => Box::new(GruPredictor::new(model.clone(), runner, &self.algorithms_dir)),
            TYPE_LINEAR => Box::new(LinearPredictor::new(
                model.clone(),
                runner,
                &self.algorithms_dir,
            )),
            _ => return None,
        };
        debug!(family = predictor.identify(), "created predictor");
        Some(predictor)
    }

    /// Like `new_predictor`, but an unknown tag is an error.
    pub fn try_new_predictor(&self, model: &ModelConfig) -> PredictResult<Box<dyn Predictor>> {
        self.new_predictor(model)
            .ok_or_else(|| PredictError::UnsupportedFamily(model.kind.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubRunner;
    use std::time::Duration;
    use warpgrid_forecast::{GruConfig, LinearConfig};

    fn factory() -> PredictorFactory {
        PredictorFactory::new(StubRunner::new(), "algorithms")
    }

    #[test]
    fn builds_gru() {
        let model = ModelConfig::gru(GruConfig {
            train_size: 10,
            predict_size: 3,
            look_ahead: Duration::from_secs(60),
            update_interval: None,
        });
        let predictor = factory().new_predictor(&model).unwrap();
        assert_eq!(predictor.identify(), TYPE_GRU);
    }

    #[test]
    fn builds_linear() {
        let model = ModelConfig::linear(LinearConfig {
            look_ahead: Duration::from_secs(60),
            history_size: 5,
        });
        let predictor = factory().new_predictor(&model).unwrap();
        assert_eq!(predictor.identify(), TYPE_LINEAR);
    }

    #[test]
    fn unknown_family_is_none() {
        let mut model = ModelConfig::linear(LinearConfig {
            look_ahead: Duration::from_secs(60),
            history_size: 5,
        });
        model.kind = "HoltWinters".to_string();

        assert!(factory().new_predictor(&model).is_none());
        assert!(matches!(
            factory().try_new_predictor(&model),
            Err(PredictError::UnsupportedFamily(ref kind)) if kind == "HoltWinters"
        ));
    }

    #[test]
    fn family_tag_without_section_still_builds() {
        // The missing section is reported when the predictor is used.
        let mut model = ModelConfig::linear(LinearConfig {
            look_ahead: Duration::from_secs(60),
            history_size: 5,
        });
        model.kind = TYPE_GRU.to_string();

        let mut predictor = factory().new_predictor(&model).unwrap();
        assert!(matches!(
            predictor.prune_history(),
            Err(PredictError::MissingConfig { .. })
        ));
    }

    #[test]
    fn supported_families_lists_every_tag() {
        assert_eq!(PredictorFactory::supported_families(), &["GRU", "Linear"]);
    }
}
