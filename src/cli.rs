use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP upload server
    Serve {
        /// Address to bind, overrides the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Mux a media file with a cover image
    Convert {
        /// Input audio/video file
        #[arg(short, long)]
        media: PathBuf,

        /// Cover image
        #[arg(short = 'i', long)]
        cover: PathBuf,

        /// Directory to save the result into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Submit to a running server instead of converting locally
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Report whether the engine, probe and namespace modules load
    Check,

    /// Write a default configuration file
    Init {
        /// Where to write the file
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let args = Args::parse_from([
            "covermux", "-v", "convert", "--media", "song.mp3", "-i", "art.jpg", "--server", "http://localhost:3000",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Convert { media, cover, output_dir, server } => {
                assert_eq!(media, PathBuf::from("song.mp3"));
                assert_eq!(cover, PathBuf::from("art.jpg"));
                assert_eq!(output_dir, PathBuf::from("."));
                assert_eq!(server.as_deref(), Some("http://localhost:3000"));
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let args = Args::parse_from(["covermux", "--config", "covermux.toml", "serve", "--bind", "127.0.0.1:8080"]);
        assert_eq!(args.config, Some(PathBuf::from("covermux.toml")));
        assert!(matches!(args.command, Commands::Serve { bind: Some(ref b) } if b == "127.0.0.1:8080"));
    }

    #[test]
    fn test_parse_init() {
        let args = Args::parse_from(["covermux", "init"]);
        assert!(matches!(args.command, Commands::Init { ref path, force: false } if path == &PathBuf::from("config.toml")));

        let args = Args::parse_from(["covermux", "init", "--path", "/etc/covermux.toml", "--force"]);
        assert!(matches!(args.command, Commands::Init { force: true, .. }));
    }
}
