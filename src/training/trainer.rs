//! Ensemble training and evaluation

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::{ModelStore, TrainingSet};
use crate::model::GradientBoostedRegressor;
use crate::{Result, StatError, TrainerConfig};

use super::cross_val::{cross_val_score, KFold};
use super::hyperparams::HyperParameterSet;
use super::metrics::{explained_variance, mean_squared_error, r2_score, EvaluationScores};

/// Trains the league-wide booster and scores it
pub struct EnsembleTrainer {
    config: TrainerConfig,
}

impl EnsembleTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        EnsembleTrainer { config }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Fit on a random 80/20 split and compute the evaluation battery.
    ///
    /// # Errors
    /// `Training` for fewer than two distinct rows, an all-non-numeric feature
    /// column, or out-of-range hyperparameters.
    pub fn train(
        &self,
        data: &TrainingSet,
        hyper_params: &HyperParameterSet,
    ) -> Result<(GradientBoostedRegressor, EvaluationScores)> {
        if !(self.config.test_fraction > 0.0 && self.config.test_fraction < 1.0) {
            return Err(StatError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.config.test_fraction
            )));
        }
        data.validate()?;
        let params = hyper_params.resolve()?;
        let mut rng = self.rng();

        let (train, test) = data.train_test_split(self.config.test_fraction, &mut rng);

        log::info!(
            "Training {} trees (depth {}, lr {}, subsample {})",
            params.n_estimators,
            params.max_depth,
            params.learning_rate,
            params.subsample
        );
        let model =
            GradientBoostedRegressor::fit(train.features(), train.targets(), &params, &mut rng)?;

        let training = r2_score(train.targets(), &model.predict_batch(train.features()));

        log::info!("Running {}-fold cross-validation", self.config.cv_folds);
        let mean_cv = cross_val_score(&train, &params, KFold::new(self.config.cv_folds), &mut rng)?;
        let kfold_cv = cross_val_score(
            &train,
            &params,
            KFold::shuffled(self.config.cv_folds),
            &mut rng,
        )?;

        let predicted = model.predict_batch(test.features());
        let scores = EvaluationScores {
            training,
            mean_cv,
            kfold_cv,
            mse: mean_squared_error(test.targets(), &predicted),
            r2: r2_score(test.targets(), &predicted),
            explained_variance: explained_variance(test.targets(), &predicted),
        };

        log::info!("{}", scores);
        Ok((model, scores))
    }

    /// Train, then store the model under `model_type`, replacing any earlier one.
    pub fn train_and_save(
        &self,
        data: &TrainingSet,
        model_type: &str,
        hyper_params: &HyperParameterSet,
        store: &mut dyn ModelStore,
    ) -> Result<(GradientBoostedRegressor, EvaluationScores)> {
        log::info!("Creating model '{}' from {} rows", model_type, data.len());
        let (model, scores) = self.train(data, hyper_params)?;
        store.save(model_type, &model)?;
        Ok((model, scores))
    }
}
