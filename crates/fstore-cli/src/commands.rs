use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use fstore_types::Digest;
use reqwest::StatusCode;
use tokio::task::JoinSet;

use crate::cli::*;
use crate::client::{ClientConfig, Content, StoreClient, UploadMode, CONFIG_FILE};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE);
    if !cli.command.needs_store() {
        if matches!(cli.command, Command::Config) {
            configure(&config_path, cli.url).await?;
        } else {
            println!("store {}", env!("CARGO_PKG_VERSION"));
        }
        return Ok(());
    }

    let client = connect(&config_path, cli.url).await?;
    match cli.command {
        Command::Add(args) => cmd_push(client, args, UploadMode::Add).await,
        Command::Update(args) => cmd_push(client, args, UploadMode::Update).await,
        Command::Get(args) => cmd_get(&client, args).await,
        Command::Remove(args) => cmd_remove(&client, args).await,
        Command::List(args) => cmd_list(&client, args).await,
        Command::Count => cmd_count(&client).await,
        Command::Frequency(args) => cmd_frequency(&client, args).await,
        Command::Config | Command::Version => Ok(()),
    }
}

/// Client for the `--url` override, the saved config, or a freshly
/// configured URL, in that order.
async fn connect(config_path: &Path, url: Option<String>) -> anyhow::Result<StoreClient> {
    if let Some(url) = url {
        return StoreClient::new(&url);
    }
    let config = match ClientConfig::load(config_path)? {
        Some(config) => config,
        None => configure(config_path, None).await?,
    };
    StoreClient::new(&config.url)
}

async fn configure(config_path: &Path, url: Option<String>) -> anyhow::Result<ClientConfig> {
    let url = match url {
        Some(url) => url,
        None => prompt("Store URL: ")?,
    };
    let client = StoreClient::new(&url)?;
    client.verify().await?;

    let config = ClientConfig {
        url: client.base_url().to_string(),
    };
    config.save(config_path)?;
    println!("{} Store configured: {}", "✓".green().bold(), config.url.blue());
    Ok(config)
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("no store URL given");
    }
    Ok(value)
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

/// Upload each file concurrently, sending only the digest when the server
/// already has the content.
async fn cmd_push(client: StoreClient, args: FilesArgs, mode: UploadMode) -> anyhow::Result<()> {
    let mut uploads = JoinSet::new();
    for path in args.files {
        let client = client.clone();
        uploads.spawn(async move {
            let label = path.display().to_string();
            (label, push_file(&client, &path, mode).await)
        });
    }

    let mut failed = 0;
    while let Some(joined) = uploads.join_next().await {
        let (label, result) = joined.context("upload task failed")?;
        match result {
            Ok(line) => println!("{line}"),
            Err(e) => {
                failed += 1;
                eprintln!("{} {label} - {e:#}", "✗".red().bold());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) failed");
    }
    Ok(())
}

async fn push_file(client: &StoreClient, path: &Path, mode: UploadMode) -> anyhow::Result<String> {
    let name = file_name(path)?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    if mode == UploadMode::Add && client.file_exists(&name).await? {
        return Ok(format!("{} {name} - already present in store", "•".yellow()));
    }

    let digest = Digest::of(&data);
    let stored = !data.is_empty() && client.content_exists(&digest).await?;
    if stored {
        tracing::debug!(file = %name, digest = %digest.short_hex(), "content already stored");
    }
    let content = upload_content(data, digest, stored);

    match client.upload(mode, &name, content).await? {
        StatusCode::CREATED => Ok(format!("{} {name} - added", "✓".green().bold())),
        StatusCode::OK => Ok(format!("{} {name} - updated", "✓".green().bold())),
        StatusCode::CONFLICT => Ok(format!("{} {name} - already present in store", "•".yellow())),
        status => bail!("upload failed ({status})"),
    }
}

/// What to send for a file: the digest alone when the server already has
/// the content or the content is empty, else the payload.
fn upload_content(data: Vec<u8>, digest: Digest, stored: bool) -> Content {
    if stored || data.is_empty() {
        Content::Known(digest)
    } else {
        Content::Payload(data)
    }
}

async fn cmd_get(client: &StoreClient, args: GetArgs) -> anyhow::Result<()> {
    let payload = client.download(&args.name).await?;
    let target = args.dir.join(&args.name);
    tokio::fs::write(&target, &payload)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    println!(
        "{} {} ({} bytes)",
        "✓".green().bold(),
        target.display().to_string().bold(),
        payload.len()
    );
    Ok(())
}

async fn cmd_remove(client: &StoreClient, args: NameArgs) -> anyhow::Result<()> {
    match client.remove(&args.name).await? {
        StatusCode::NO_CONTENT | StatusCode::OK => {
            println!("{} {} - removed", "✓".green().bold(), args.name);
            Ok(())
        }
        StatusCode::NOT_FOUND => bail!("{} - not found in store", args.name),
        status => bail!("{} - remove failed ({status})", args.name),
    }
}

async fn cmd_list(client: &StoreClient, args: ListArgs) -> anyhow::Result<()> {
    if args.details {
        let records = client.list_details().await?;
        println!("{}", format!("{:<30} {:>12} {:>10}", "FILE NAME", "BYTES", "WORDS").bold());
        for record in records {
            println!("{:<30} {:>12} {:>10}", record.name, record.size, record.word_count);
        }
    } else {
        let names = client.list_names().await?;
        println!("{}", "FILE NAME".bold());
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

async fn cmd_count(client: &StoreClient) -> anyhow::Result<()> {
    println!("{}", client.word_count().await?);
    Ok(())
}

async fn cmd_frequency(client: &StoreClient, args: FrequencyArgs) -> anyhow::Result<()> {
    for entry in client.word_frequency(args.order, args.limit).await? {
        println!("{:>10} {}", entry.count.to_string().cyan(), entry.word);
    }
    Ok(())
}
