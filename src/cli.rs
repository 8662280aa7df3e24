use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Input, Select};

use crate::config::{self, Config};
use crate::core::pipeline::Pipeline;
use crate::core::renamer;
use crate::core::tagger::{self, TagInfo};
use crate::models::{RankedResult, Track};

const SHELL_SESSION: &str = "shell";
const RETRIEVE_FAILED: &str = "could not retrieve this track";

#[derive(Parser)]
#[command(name = "tunefetch", version, about = "Search SoundCloud and SkySound, download MP3s")]
pub struct Cli {
    /// Config file (default: ~/.config/tunefetch/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search both catalogs and print ranked results
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        /// Rows to show
        #[arg(long, default_value_t = 40)]
        limit: usize,
    },
    /// Search, pick a track and save it as MP3
    Fetch {
        #[arg(required = true)]
        query: Vec<String>,
        /// Result number to download (asks when omitted)
        #[arg(long)]
        pick: Option<usize>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Keep the file as downloaded, without ID3 title/artist/cover
        #[arg(long)]
        no_tags: bool,
    },
    /// Search and download repeatedly until an empty query
    Shell {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Set the streaming API client id and proxy
    Config,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Search { query, limit } => {
            let pipeline = open_pipeline(&config_path)?;
            cmd_search(&pipeline, &query.join(" "), limit).await
        }
        Commands::Fetch {
            query,
            pick,
            out,
            no_tags,
        } => {
            let pipeline = open_pipeline(&config_path)?;
            cmd_fetch(&pipeline, &query.join(" "), pick, &out, !no_tags).await
        }
        Commands::Shell { out } => {
            let pipeline = open_pipeline(&config_path)?;
            cmd_shell(&pipeline, &out).await
        }
        Commands::Config => cmd_config(&config_path),
    }
}

fn open_pipeline(config_path: &Path) -> Result<Pipeline> {
    let cfg = config::load_config(config_path)?;
    if !cfg.streaming.is_configured() {
        eprintln!("SoundCloud client id is not set; only SkySound will be searched.");
        eprintln!("Run 'tunefetch config' or set TUNEFETCH_CLIENT_ID.\n");
    }
    Ok(Pipeline::from_config(&cfg)?)
}

fn results_table(results: &[RankedResult], limit: usize) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Score", "Time", "Artist", "Title", "Source"]);

    for (i, r) in results.iter().take(limit).enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(r.score),
            Cell::new(&r.track.duration),
            Cell::new(&r.track.artist),
            Cell::new(&r.track.title),
            Cell::new(r.track.source),
        ]);
    }
    table
}

async fn cmd_search(pipeline: &Pipeline, query: &str, limit: usize) -> Result<()> {
    let results = pipeline.search(query).await?;

    if results.is_empty() {
        println!("Nothing found.");
        return Ok(());
    }

    println!("{}", results_table(&results, limit));
    if results.len() > limit {
        println!("\n{} of {} results shown", limit, results.len());
    }
    Ok(())
}

async fn cmd_fetch(
    pipeline: &Pipeline,
    query: &str,
    pick: Option<usize>,
    out: &Path,
    tags: bool,
) -> Result<()> {
    let results = pipeline.search(query).await?;
    if results.is_empty() {
        println!("Nothing found.");
        return Ok(());
    }

    let index = match pick {
        Some(0) => bail!("--pick starts at 1"),
        Some(n) if n > results.len() => bail!("--pick {} is out of range (1-{})", n, results.len()),
        Some(n) => n - 1,
        None => {
            let items: Vec<String> = results.iter().map(|r| r.track.summary()).collect();
            Select::new()
                .with_prompt("Pick a track")
                .items(&items)
                .default(0)
                .interact()?
        }
    };

    let track = &results[index].track;
    let path = deliver(pipeline, track, out, tags).await?;
    println!("Saved: {}", path.display());
    Ok(())
}

async fn cmd_shell(pipeline: &Pipeline, out: &Path) -> Result<()> {
    loop {
        let query: String = Input::new()
            .with_prompt("Search (empty to quit)")
            .allow_empty(true)
            .interact_text()?;
        if query.trim().is_empty() {
            return Ok(());
        }

        let results = pipeline.search_session(SHELL_SESSION, &query).await?;
        if results.is_empty() {
            println!("Nothing found.\n");
            continue;
        }

        let mut items: Vec<String> = results.iter().map(|r| r.track.summary()).collect();
        items.push("New search".to_string());

        let selection = Select::new()
            .with_prompt("Pick a track")
            .items(&items)
            .default(0)
            .interact()?;

        let Some(track) = pipeline.select(SHELL_SESSION, selection) else {
            continue;
        };

        println!("Downloading: {} - {}", track.artist, track.title);
        match deliver(pipeline, &track, out, true).await {
            Ok(path) => println!("Saved: {}\n", path.display()),
            Err(e) => println!("{:#}\n", e),
        }
    }
}

/// Resolves, downloads, tags and saves one track.
async fn deliver(pipeline: &Pipeline, track: &Track, out: &Path, tags: bool) -> Result<PathBuf> {
    let audio = pipeline
        .resolve_and_download(track)
        .await
        .context(RETRIEVE_FAILED)?;

    let audio = if tags {
        let cover = pipeline.fetch_thumbnail(track).await;
        let info = TagInfo {
            title: track.title.clone(),
            artist: track.artist.clone(),
            cover,
        };
        tagger::embed_tags(&audio, &info).context("could not write tags")?
    } else {
        audio
    };

    renamer::save_track(out, track, &audio).context("could not save the file")
}

fn cmd_config(path: &Path) -> Result<()> {
    // Read the file as-is so an environment override is not persisted.
    let mut cfg = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        config::parse_config(&content)?
    } else {
        Config::default()
    };

    println!("SoundCloud API settings ({})\n", path.display());

    let current_id = cfg.streaming.client_id.clone().unwrap_or_default();
    let client_id: String = Input::new()
        .with_prompt("Client ID")
        .with_initial_text(current_id)
        .allow_empty(true)
        .interact_text()?;

    let current_proxy = cfg.proxy.clone().unwrap_or_default();
    let proxy: String = Input::new()
        .with_prompt("Proxy URL (empty for none)")
        .with_initial_text(current_proxy)
        .allow_empty(true)
        .interact_text()?;

    cfg.streaming.client_id = Some(client_id.trim().to_string()).filter(|s| !s.is_empty());
    cfg.proxy = Some(proxy.trim().to_string()).filter(|s| !s.is_empty());

    config::save_config(path, &cfg)?;
    println!("\nSaved.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["tunefetch", "search", "good", "morning", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query.join(" "), "good morning");
                assert_eq!(limit, 5);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_parse_fetch_defaults() {
        let cli = Cli::try_parse_from(["tunefetch", "fetch", "кино"]).unwrap();
        match cli.command {
            Commands::Fetch { pick, out, no_tags, .. } => {
                assert_eq!(pick, None);
                assert_eq!(out, PathBuf::from("."));
                assert!(!no_tags);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Cli::try_parse_from(["tunefetch", "search"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["tunefetch", "config", "--config", "/tmp/x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn test_results_table_respects_limit() {
        let results: Vec<RankedResult> = (0..5)
            .map(|i| RankedResult {
                score: 90,
                track: Track::new(format!("t{i}"), "a", "1:00", SourceKind::StreamingApi, "X"),
            })
            .collect();
        let rendered = results_table(&results, 2).to_string();
        assert!(rendered.contains("t0"));
        assert!(rendered.contains("t1"));
        assert!(!rendered.contains("t2"));
    }
}
