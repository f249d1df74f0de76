use anyhow::Context;
use clap::{Parser, Subcommand};
use depot_files::{
    resolve_config_path, DepotConfig, File, FileId, FileRepository, SizeBase, SizeUnit,
    TracingNotifier, UploadedFile,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Depot file repository CLI")]
struct Cli {
    /// Configuration file (defaults to $DEPOT_CONFIG, then ./depot.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file and record it
    Upload {
        /// Local file to upload
        source: PathBuf,
        /// Destination, e.g. "photos/" or "archive::2024/scan.png"
        #[arg(long, default_value = "/")]
        to: String,
        /// Disk to store on (defaults to the destination's disk, then the default disk)
        #[arg(long)]
        disk: Option<String>,
    },
    /// List all recorded files
    List,
    /// Show one file record as JSON
    Show {
        /// File id
        id: String,
    },
    /// Move a file to another path and/or disk
    Move {
        /// File id
        id: String,
        /// Destination, e.g. "dir/", "dir/new.png" or "archive::dir/"
        destination: String,
    },
    /// Rename a file in place
    Rename {
        /// File id
        id: String,
        /// New file name, without directories
        new_name: String,
    },
    /// Write the file's bytes to stdout
    Cat {
        /// File id
        id: String,
    },
    /// Print the file's public URL
    Url {
        /// File id
        id: String,
    },
    /// Check whether the file's bytes are present
    Exists {
        /// File id
        id: String,
    },
    /// Print the file's size
    Size {
        /// File id
        id: String,
        /// bytes, kb, mb or gb
        #[arg(long, default_value = "bytes")]
        unit: String,
        /// binary (1024) or decimal (1000)
        #[arg(long, default_value = "binary")]
        base: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Upload { .. } => "upload",
            Commands::List => "list",
            Commands::Show { .. } => "show",
            Commands::Move { .. } => "move",
            Commands::Rename { .. } => "rename",
            Commands::Cat { .. } => "cat",
            Commands::Url { .. } => "url",
            Commands::Exists { .. } => "exists",
            Commands::Size { .. } => "size",
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("depot=warn".parse()?)
                .add_directive("depot_files=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'depot --help' for commands");
        return Ok(());
    };

    let config_override = cli
        .config
        .or_else(|| std::env::var_os("DEPOT_CONFIG").map(PathBuf::from));
    let repository = open_repository(config_override)?;

    tracing::debug!(command = command.name(), "running command");

    match command {
        Commands::Upload { source, to, disk } => {
            let upload = UploadedFile::from_path(&source)?;
            let file = repository
                .create_from_upload(&upload, &to, disk.as_deref())
                .inspect_err(|e| {
                    tracing::warn!(source = %source.display(), destination = %to, error = %e, "upload failed")
                })?;
            println!(
                "Uploaded {} to {}::{} (id: {})",
                source.display(),
                file.disk(),
                file.fullname(),
                file.id()
            );
        }
        Commands::List => {
            let files = repository.list()?;
            if files.is_empty() {
                println!("No files found.");
            } else {
                for file in files {
                    println!(
                        "ID: {}, Location: {}::{}, Size: {}, Created: {}",
                        file.id(),
                        file.disk(),
                        file.fullname(),
                        file.size(),
                        file.created_at()
                    );
                }
            }
        }
        Commands::Show { id } => {
            let file = find(&repository, &id)?;
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
        Commands::Move { id, destination } => {
            let mut file = find(&repository, &id)?;
            let events = repository.move_file(&mut file, &destination)?;
            if events.is_empty() {
                println!("File {} is already at {}", file.id(), destination);
            } else {
                println!("Moved {} to {}::{}", file.id(), file.disk(), file.fullname());
            }
        }
        Commands::Rename { id, new_name } => {
            let mut file = find(&repository, &id)?;
            repository.rename(&mut file, &new_name)?;
            println!("Renamed {} to {}", file.id(), file.fullname());
        }
        Commands::Cat { id } => {
            let file = find(&repository, &id)?;
            let contents = repository.content(&file)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&contents)?;
            stdout.flush()?;
        }
        Commands::Url { id } => {
            let file = find(&repository, &id)?;
            println!("{}", repository.url(&file)?);
        }
        Commands::Exists { id } => {
            let file = find(&repository, &id)?;
            println!("{}", repository.exists(&file)?);
        }
        Commands::Size { id, unit, base } => {
            let unit: SizeUnit = unit.parse()?;
            let base: SizeBase = base.parse()?;
            let file = find(&repository, &id)?;
            println!("{}", repository.size(&file, unit, base));
        }
    }

    Ok(())
}

fn open_repository(config_override: Option<PathBuf>) -> anyhow::Result<FileRepository> {
    let path = resolve_config_path(config_override)?;
    let config = DepotConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    tracing::debug!(
        config = %path.display(),
        default_disk = %config.default_disk(),
        "configuration loaded"
    );
    Ok(config.repository(Arc::new(TracingNotifier))?)
}

fn find(repository: &FileRepository, id: &str) -> anyhow::Result<File> {
    let id = FileId::parse(id).with_context(|| format!("'{}' is not a file id", id))?;
    Ok(repository.find(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_with_defaults() {
        let cli = Cli::try_parse_from(["depot", "upload", "scan.png"]).unwrap();

        match cli.command {
            Some(Commands::Upload { source, to, disk }) => {
                assert_eq!(source, PathBuf::from("scan.png"));
                assert_eq!(to, "/");
                assert!(disk.is_none());
            }
            _ => panic!("expected upload command"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["depot", "move", "abc", "archive::dir/", "--config", "d.yaml"])
                .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("d.yaml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Move { destination, .. }) if destination == "archive::dir/"
        ));
    }

    #[test]
    fn size_defaults_to_binary_bytes() {
        let cli = Cli::try_parse_from(["depot", "size", "abc"]).unwrap();

        assert!(matches!(
            cli.command,
            Some(Commands::Size { unit, base, .. }) if unit == "bytes" && base == "binary"
        ));
    }

    #[test]
    fn command_names_match_subcommands() {
        for (args, name) in [
            (vec!["depot", "list"], "list"),
            (vec!["depot", "cat", "abc"], "cat"),
            (vec!["depot", "rename", "abc", "new.png"], "rename"),
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.command.map(|c| c.name()), Some(name));
        }
    }
}
