//! MLB stat forecasting CLI
//!
//! Trains the league-wide ensemble and writes next-season xwOBA predictions.

use clap::{Args, Parser, Subcommand};
use mlbstat::training::HyperParameterSet;
use mlbstat::{Config, Result};

#[derive(Parser)]
#[command(name = "mlbstat")]
#[command(about = "Per-player xwOBA forecasting", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train and store an ensemble model
    Train {
        /// Name the model is stored under
        #[arg(long)]
        model_type: String,
        /// Last season to train on (defaults to the configured one)
        #[arg(long)]
        end_season: Option<i32>,
        #[command(flatten)]
        hyper_params: HyperParamArgs,
    },
    /// Predict the season after `--season` for every player
    Predict {
        /// Last season of history; predictions are for the one after
        #[arg(long)]
        season: i32,
        /// Ensemble model used for short histories
        #[arg(long)]
        model_type: String,
        /// Use the ensemble model for every player
        #[arg(long)]
        ensemble_only: bool,
        /// Copy the model's held-out R² onto its predictions
        #[arg(long)]
        fill_ensemble_r2: bool,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Ensemble prediction for a single stat line (JSON object)
    PredictOne {
        #[arg(long)]
        model_type: String,
        /// JSON file with `player_age` and every stat field
        #[arg(long)]
        stats: String,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import stat records from a JSON array
    Import {
        file: String,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show stored scores and hyperparameters
    Info {
        #[arg(long)]
        model_type: String,
    },
}

/// Per-run overrides; anything unset falls back to `[hyperparams]` in the config
#[derive(Args, Debug, Default)]
struct HyperParamArgs {
    #[arg(long)]
    n_estimators: Option<usize>,
    #[arg(long)]
    subsample: Option<f64>,
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    gamma: Option<f64>,
    #[arg(long)]
    reg_alpha: Option<f64>,
    #[arg(long)]
    reg_lambda: Option<f64>,
}

impl From<HyperParamArgs> for HyperParameterSet {
    fn from(args: HyperParamArgs) -> Self {
        HyperParameterSet {
            n_estimators: args.n_estimators,
            subsample: args.subsample,
            max_depth: args.max_depth,
            learning_rate: args.learning_rate,
            gamma: args.gamma,
            reg_alpha: args.reg_alpha,
            reg_lambda: args.reg_lambda,
        }
    }
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { file } => commands::data_import(&config, &file),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train {
            model_type,
            end_season,
            hyper_params,
        } => commands::train(&config, &model_type, end_season, hyper_params.into()),
        Commands::Predict {
            season,
            model_type,
            ensemble_only,
            fill_ensemble_r2,
            format,
        } => commands::predict(
            &config,
            season,
            &model_type,
            ensemble_only,
            fill_ensemble_r2,
            format,
        ),
        Commands::PredictOne { model_type, stats } => {
            commands::predict_one(&config, &model_type, &stats)
        }
        Commands::Model { action } => match action {
            ModelCommands::Info { model_type } => commands::model_info(&config, &model_type),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use mlbstat::data::{Database, FileModelStore, ModelStore, TrainingSet};
    use mlbstat::predict::{format_prediction, EnsemblePredictor, PredictionOrchestrator};
    use mlbstat::training::EnsembleTrainer;
    use mlbstat::{StatError, StatLine, StatRecord};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all(&config.data.model_dir)?;
        println!("Created data/ and {}/ directories", config.data.model_dir);

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'mlbstat data import stats.json' to load batting data");
        println!("  3. Run 'mlbstat train --model-type xgb' to train the ensemble");
        println!("  4. Run 'mlbstat predict --season 2020 --model-type xgb' to forecast 2021");

        Ok(())
    }

    pub fn data_import(config: &Config, file: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        let content = std::fs::read_to_string(file)?;
        let records: Vec<StatRecord> = serde_json::from_str(&content)?;
        println!("Read {} records from {}", records.len(), file);

        let count = db.upsert_stat_records(&records)?;
        println!("Stored {} records in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Players:     {}", stats.player_count);
        println!("  Records:     {}", stats.record_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_season, stats.latest_season) {
            println!("  Seasons:     {} to {}", earliest, latest);
        }
        println!("  Predictions: {}", stats.prediction_count);

        Ok(())
    }

    pub fn train(
        config: &Config,
        model_type: &str,
        end_season: Option<i32>,
        overrides: HyperParameterSet,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let mut store = FileModelStore::open(&config.data.model_dir)?;

        let end = end_season.unwrap_or(config.history.training_end_season);
        let history = db.get_history(config.history.start_season, end)?;
        let (first, last) = history.season_range();
        println!(
            "Training '{}' on {} records from {} players ({}..={})",
            model_type,
            history.len(),
            history.player_count(),
            first,
            last
        );

        let data = TrainingSet::from_records(history.records())?;
        let hyper_params = overrides.or(&config.hyperparams);

        let trainer = EnsembleTrainer::new(config.training.clone());
        let (model, scores) = trainer.train_and_save(&data, model_type, &hyper_params, &mut store)?;

        db.save_ensemble_scores(model_type, &scores)?;
        db.save_hyperparams(model_type, &hyper_params)?;

        println!("\nModel '{}' ({} trees)", model_type, model.n_trees());
        println!("───────────────────────────────");
        println!("  Train R²:        {:.4}", scores.training);
        println!("  Mean CV R²:      {:.4}", scores.mean_cv);
        println!("  K-fold CV R²:    {:.4}", scores.kfold_cv);
        println!("  Test MSE:        {:.6}", scores.mse);
        println!("  Test R²:         {:.4}", scores.r2);
        println!("  Explained var:   {:.4}", scores.explained_variance);

        Ok(())
    }

    pub fn predict(
        config: &Config,
        season: i32,
        model_type: &str,
        ensemble_only: bool,
        fill_ensemble_r2: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = FileModelStore::open(&config.data.model_dir)?;

        let history = db.get_history(config.history.start_season, season)?;
        let target_season = season + 1;

        let orchestrator = PredictionOrchestrator::new(&store, config.prediction.clone());
        let predictions =
            orchestrator.generate_predictions(&history, target_season, model_type, ensemble_only)?;

        if fill_ensemble_r2 {
            db.replace_predictions_with_ensemble_r2(target_season, &predictions, model_type)?;
        } else {
            db.replace_predictions(target_season, &predictions)?;
        }
        let predictions = db.get_predictions(target_season)?;

        match format {
            OutputFormat::Table => {
                println!("Predictions for {}", target_season);
                println!("───────────────────────────────────────────────────────");
                for prediction in &predictions {
                    println!("{}", format_prediction(prediction));
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&predictions)?);
            }
            OutputFormat::Csv => {
                println!("player_id,season,predicted_xwoba,rsquared,model");
                for p in &predictions {
                    println!(
                        "{},{},{:.4},{},{}",
                        p.player_id.0,
                        p.season,
                        p.predicted_xwoba,
                        p.rsquared.map(|r| format!("{:.4}", r)).unwrap_or_default(),
                        p.model
                    );
                }
            }
        }

        Ok(())
    }

    pub fn predict_one(config: &Config, model_type: &str, stats_file: &str) -> Result<()> {
        let store = FileModelStore::open(&config.data.model_dir)?;
        let predictor = EnsemblePredictor::load(&store, model_type)?;

        let content = std::fs::read_to_string(stats_file)?;
        let line: StatLine = serde_json::from_str(&content)?;
        let value = predictor.predict_stats(&line, None)?;

        println!("{:.4}", value);
        Ok(())
    }

    pub fn model_info(config: &Config, model_type: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let store = FileModelStore::open(&config.data.model_dir)?;

        println!("Model '{}'", model_type);
        println!("───────────────────────────────");
        println!("  Artifact:   {}", store.path_for(model_type)?.display());
        match store.load(model_type) {
            Ok(model) => {
                let params = model.params();
                println!("  Trees:      {}", model.n_trees());
                println!("  Features:   {}", model.n_features());
                println!(
                    "  Booster:    depth {}, lr {}, subsample {}, gamma {}, alpha {}, lambda {}",
                    params.max_depth,
                    params.learning_rate,
                    params.subsample,
                    params.gamma,
                    params.reg_alpha,
                    params.reg_lambda
                );
            }
            Err(StatError::ModelNotFound(_)) => println!("  Trees:      (not trained)"),
            Err(e) => return Err(e),
        }

        if let Some(stored) = db.get_ensemble_scores(model_type)? {
            if let Some(created_at) = stored.created_at {
                println!("  Trained:    {}", created_at.format("%Y-%m-%d %H:%M"));
            }
            println!("  Scores:     {}", stored.scores);
        }

        if let Some(params) = db.get_hyperparams(model_type)? {
            println!("  Hyperparameters:");
            for (name, value) in params.entries() {
                println!("    {:<14} {}", name, value);
            }
        }

        Ok(())
    }
}
