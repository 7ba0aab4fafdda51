use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "debload",
    about = "Load Debian source packages into a content-addressed archive",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a batch of source packages into an archive directory
    Load(LoadArgs),
    /// Print the hashes of files and the identifiers of directories
    Hash(HashArgs),
}

#[derive(Args)]
pub struct LoadArgs {
    /// Loader configuration (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Packages to load (TOML, one `[[package]]` table each)
    #[arg(short, long)]
    pub manifest: PathBuf,
    /// Archive directory, created if missing
    #[arg(short, long)]
    pub store: PathBuf,
    /// Parent directory for extraction; overrides the configuration
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Kill the extraction tool after this many seconds
    #[arg(long)]
    pub extract_timeout: Option<u64>,
    /// Keep on-disk copies of duplicate files until the flush
    #[arg(long)]
    pub keep_duplicates: bool,
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_load() {
        let cli = Cli::try_parse_from([
            "debload", "load", "-m", "batch.toml", "-s", "/srv/archive",
        ])
        .unwrap();
        if let Command::Load(args) = cli.command {
            assert_eq!(args.manifest, PathBuf::from("batch.toml"));
            assert_eq!(args.store, PathBuf::from("/srv/archive"));
            assert!(args.config.is_none());
            assert!(!args.keep_duplicates);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_load_overrides() {
        let cli = Cli::try_parse_from([
            "debload",
            "load",
            "--config",
            "debload.toml",
            "--manifest",
            "batch.toml",
            "--store",
            "archive",
            "--work-dir",
            "/var/tmp",
            "--extract-timeout",
            "300",
            "--keep-duplicates",
        ])
        .unwrap();
        if let Command::Load(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("debload.toml")));
            assert_eq!(args.work_dir, Some(PathBuf::from("/var/tmp")));
            assert_eq!(args.extract_timeout, Some(300));
            assert!(args.keep_duplicates);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn load_requires_store() {
        assert!(Cli::try_parse_from(["debload", "load", "-m", "batch.toml"]).is_err());
    }

    #[test]
    fn parse_hash() {
        let cli = Cli::try_parse_from(["debload", "hash", "a", "b"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.paths.len(), 2);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn hash_requires_a_path() {
        assert!(Cli::try_parse_from(["debload", "hash"]).is_err());
    }

    #[test]
    fn parse_verbose_json() {
        let cli = Cli::try_parse_from(["debload", "--verbose", "--format", "json", "hash", "x"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
