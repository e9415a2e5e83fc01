use std::path::PathBuf;

use clap::Parser;
use seiki_trainer::{run_training, TrainConfig};
use tracing_subscriber::EnvFilter;

/// Train the character normalizer and write `normalizer.zip`.
#[derive(Parser)]
#[command(name = "train")]
#[command(version)]
struct Cli {
    /// Training corpus (`normalized<TAB>raw` per line)
    train_file: PathBuf,

    /// Dev corpus, scored after every epoch
    dev_file: PathBuf,

    /// Test corpus, scored once after training
    test_file: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_training(
        cli.train_file,
        cli.dev_file,
        cli.test_file,
        TrainConfig::default(),
    ) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_three_positionals() {
        let cli = Cli::try_parse_from(["train", "train.tsv", "dev.tsv", "test.tsv"]).unwrap();
        assert_eq!(cli.train_file, PathBuf::from("train.tsv"));
        assert_eq!(cli.dev_file, PathBuf::from("dev.tsv"));
        assert_eq!(cli.test_file, PathBuf::from("test.tsv"));
    }

    #[test]
    fn test_wrong_arity_is_a_usage_error() {
        let err = Cli::try_parse_from(["train", "train.tsv", "dev.tsv"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("Usage"));

        let err = Cli::try_parse_from(["train", "a.tsv", "b.tsv", "c.tsv", "d.tsv"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
