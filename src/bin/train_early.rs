//! Trains the early-classification model on a synthetic two-class dataset
//! and reports accuracy against how much of each sequence was consumed.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use early_rnn::data::synthetic;
use early_rnn::utils::metrics;
use early_rnn::{EarlyRnn, EarlyRnnConfig};

#[derive(Parser, Debug)]
#[command(
    name = "train_early",
    about = "Train a dual-output LSTM for early time-series classification"
)]
struct Args {
    /// Number of synthetic training sequences
    #[arg(long, default_value_t = 1000)]
    n_samples: usize,

    /// Timesteps per sequence
    #[arg(long, default_value_t = 50)]
    seq_len: usize,

    /// LSTM hidden state width
    #[arg(long, default_value_t = 32)]
    hidden_size: usize,

    /// Training epochs
    #[arg(long, default_value_t = 40)]
    epochs: usize,

    /// Epochs on the classification-only objective before the
    /// early-classification objective takes over (default: half the epochs)
    #[arg(long)]
    warmup_epochs: Option<usize>,

    /// Minibatch size
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.01)]
    learning_rate: f64,

    /// Weight of the time penalty; larger values push decisions earlier
    #[arg(long, default_value_t = 0.01)]
    earliness_factor: f64,

    /// Seed for data generation and decision sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Save the trained model here
    #[arg(long)]
    model_out: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = StdRng::seed_from_u64(args.seed);

    println!(
        "Generating {} sequences of {} timesteps...",
        args.n_samples, args.seq_len
    );
    let (x_train, y_train) =
        synthetic::two_class_shift(args.n_samples, args.seq_len, 1, &mut rng);
    let (x_test, y_test) =
        synthetic::two_class_shift(args.n_samples / 4, args.seq_len, 1, &mut rng);

    let mut config = EarlyRnnConfig::new(2, args.seq_len, 1)
        .with_hidden_size(args.hidden_size)
        .with_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.learning_rate)
        .with_earliness_factor(args.earliness_factor);
    if let Some(warmup) = args.warmup_epochs {
        config = config.with_warmup_epochs(warmup);
    }

    println!(
        "Training: {} warm-up epochs, {} full-objective epochs",
        config.switch_epoch(),
        config.epochs - config.switch_epoch()
    );
    let mut model = EarlyRnn::new(config)?;
    model.fit(&x_train, &y_train)?;

    let (predicted, stopping_times) = model.predict(&x_test, &mut rng)?;
    let actual = metrics::one_hot_to_labels(&y_test);

    println!("\nTest results:");
    println!(
        "  accuracy:       {:.2}%",
        metrics::accuracy(&predicted, &actual) * 100.0
    );
    println!(
        "  mean earliness: {:.2}% of the sequence consumed",
        metrics::mean_earliness(&stopping_times, args.seq_len) * 100.0
    );

    if let Some(path) = args.model_out {
        model.save(&path)?;
        println!("Model saved to {}", path);
    }

    Ok(())
}
