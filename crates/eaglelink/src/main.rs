//! `eaglelink` - CLI for linking Eagle assets and uploading note images

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use eaglelink::cli::{
    Cli, Command, ConfigCommand, FoldersCommand, HistoryCommand, LinkCommand, OutputFormat,
    PasteCommand, ProviderArg, RewriteCommand, SearchCommand, ShowCommand, StatusCommand,
    UploadCommand,
};
use eaglelink::eagle::{flatten_folders, resolve_folder_id, ListQuery};
use eaglelink::format::format_tags;
use eaglelink::link::{find_local_images, replace_images};
use eaglelink::paste::{paste_file_name, read_clipboard_image};
use eaglelink::upload::{publish, Published};
use eaglelink::{
    init_logging, Asset, AssetFilter, Config, EagleClient, History, LinkBuilder, LinkTarget,
    UploadManager, UploadRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // Validation reports load errors itself, so it runs before loading
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.as_deref().or(cli.config.as_deref()));
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Status(cmd) => handle_status(&config, &cmd).await,
        Command::Search(cmd) => handle_search(&config, &cmd).await,
        Command::Show(cmd) => handle_show(&config, &cmd).await,
        Command::Link(cmd) => handle_link(&config, &cmd).await,
        Command::Folders(cmd) => handle_folders(&config, &cmd).await,
        Command::Upload(cmd) => handle_upload(&config, &cmd).await,
        Command::Paste(cmd) => handle_paste(&config, &cmd).await,
        Command::Rewrite(cmd) => handle_rewrite(&config, &cmd).await,
        Command::History(cmd) => handle_history(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cli.config.as_deref(), &cmd),
    }
}

fn eagle_client(config: &Config) -> anyhow::Result<EagleClient> {
    Ok(EagleClient::new(&config.eagle)?)
}

/// Turn an unreachable-Eagle error into a readable hint.
fn eagle_context(err: eaglelink::Error, base_url: &str) -> anyhow::Error {
    if err.is_connection_error() {
        anyhow::anyhow!("cannot reach Eagle at {base_url}; is the app running? ({err})")
    } else {
        err.into()
    }
}

async fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let client = eagle_client(config)?;
    if !client.is_running().await {
        if cmd.json {
            let status = serde_json::json!({ "running": false, "base_url": client.base_url() });
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
        bail!("Eagle is not running at {}", client.base_url());
    }

    let (app, library) = tokio::try_join!(client.application_info(), client.library_info())
        .map_err(|e| eagle_context(e, client.base_url()))?;

    if cmd.json {
        let status = serde_json::json!({
            "running": true,
            "base_url": client.base_url(),
            "application": app,
            "library": library.library,
            "folders": flatten_folders(&library.folders).len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("eaglelink status");
        println!("----------------");
        println!("Eagle:     {} (build {}, {})", app.version, app.build_version, app.platform);
        println!("URL:       {}", client.base_url());
        println!("Library:   {}", library.library.name);
        println!("Path:      {}", library.library.path.display());
        println!("Folders:   {}", flatten_folders(&library.folders).len());
    }
    Ok(())
}

async fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let client = eagle_client(config)?;

    let folder_ids = if cmd.folders.is_empty() {
        Vec::new()
    } else {
        let folders = client
            .folder_list()
            .await
            .map_err(|e| eagle_context(e, client.base_url()))?;
        cmd.folders
            .iter()
            .map(|reference| {
                resolve_folder_id(&folders, reference)
                    .with_context(|| format!("no folder matches '{reference}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut filter = AssetFilter::new()
        .extensions(&cmd.extensions)
        .tags(&cmd.tags)
        .folders(&folder_ids);
    filter.min_size = cmd.min_size;
    filter.max_size = cmd.max_size;

    let base = ListQuery::for_filter(&filter, config.eagle.search_limit);
    let assets = client
        .search(&base, &filter, cmd.query.as_deref(), cmd.limit)
        .await
        .map_err(|e| eagle_context(e, client.base_url()))?;

    print_assets(&assets, cmd.format)
}

fn print_assets(assets: &[Asset], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(assets)?),
        OutputFormat::Plain => {
            for asset in assets {
                println!("{}\t{}\t{}", asset.id, asset.file_name(), asset.display_size());
            }
        }
        OutputFormat::Table => {
            let name_width = assets
                .iter()
                .map(|a| a.file_name().chars().count())
                .max()
                .unwrap_or(4)
                .max(4);
            println!(
                "{:<13}  {:<name_width$}  {:>9}  {:>11}  TAGS",
                "ID", "NAME", "SIZE", "DIMENSIONS"
            );
            for asset in assets {
                println!(
                    "{:<13}  {:<name_width$}  {:>9}  {:>11}  {}",
                    asset.id,
                    asset.file_name(),
                    asset.display_size(),
                    asset.dimensions().unwrap_or_default(),
                    format_tags(&asset.tags),
                );
            }
        }
    }
    if assets.is_empty() && format != OutputFormat::Json {
        info!("No matching assets");
    }
    Ok(())
}

async fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let client = eagle_client(config)?;
    let detail = client
        .asset_detail(&cmd.id)
        .await
        .map_err(|e| eagle_context(e, client.base_url()))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let asset = &detail.asset;
    println!("{}", asset.file_name());
    println!("  ID:          {}", asset.id);
    println!("  Size:        {}", asset.display_size());
    if let Some(dimensions) = asset.dimensions() {
        println!("  Dimensions:  {dimensions}");
    }
    if !asset.tags.is_empty() {
        println!("  Tags:        {}", format_tags(&asset.tags));
    }
    if !asset.url.is_empty() {
        println!("  Source:      {}", asset.url);
    }
    if !asset.annotation.is_empty() {
        println!("  Note:        {}", asset.annotation);
    }
    if let Some(thumbnail) = &detail.thumbnail {
        println!("  Thumbnail:   {}", thumbnail.display());
    }
    Ok(())
}

async fn handle_link(config: &Config, cmd: &LinkCommand) -> anyhow::Result<()> {
    let client = eagle_client(config)?;

    let mut builder = LinkBuilder::from_config(&config.link);
    if let Some(style) = cmd.style {
        builder.style = style.into();
    }
    if cmd.width.is_some() {
        builder.image_width = cmd.width;
    }
    builder.include_tags |= cmd.tags;
    let use_thumbnail = cmd.thumbnail || config.link.use_thumbnail;

    let library_root = if use_thumbnail || builder.style == eaglelink::LinkStyle::Eagle {
        None
    } else {
        Some(
            client
                .library_root(config.eagle.library_path.as_deref())
                .await
                .map_err(|e| eagle_context(e, client.base_url()))?,
        )
    };

    for id in &cmd.ids {
        let asset = client
            .item_info(id)
            .await
            .map_err(|e| eagle_context(e, client.base_url()))?;
        let target = if use_thumbnail {
            LinkTarget::Path(client.item_thumbnail(id).await?)
        } else if let Some(root) = &library_root {
            LinkTarget::Path(asset.file_path(root))
        } else {
            LinkTarget::Url(format!("eagle://item/{}", asset.id))
        };
        println!("{}", builder.render(&asset, &target)?);
    }
    Ok(())
}

async fn handle_folders(config: &Config, cmd: &FoldersCommand) -> anyhow::Result<()> {
    let client = eagle_client(config)?;
    let folders = client
        .folder_list()
        .await
        .map_err(|e| eagle_context(e, client.base_url()))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        for (path, id) in flatten_folders(&folders) {
            println!("{id}\t{path}");
        }
    }
    Ok(())
}

fn upload_manager(config: &Config, provider: Option<ProviderArg>) -> anyhow::Result<UploadManager> {
    let manager = match provider {
        Some(kind) => UploadManager::with_provider(&config.upload, kind.into())?,
        None => UploadManager::from_config(&config.upload)?,
    };
    Ok(manager)
}

/// Open the history, or carry on without it.
fn open_history(config: &Config) -> Option<History> {
    if !config.history.enabled {
        return None;
    }
    match History::open(config.database_path()) {
        Ok(history) => {
            if let Some(max_age) = config.max_history_age() {
                if let Err(e) = history.prune_older_than(max_age) {
                    warn!(error = %e, "Failed to prune upload history");
                }
            }
            Some(history)
        }
        Err(e) => {
            warn!(error = %e, "Upload history unavailable");
            None
        }
    }
}

fn print_published(published: &Published, markdown: bool) {
    if markdown {
        let alt = Path::new(&published.file_name)
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        println!("![{alt}]({})", published.outcome.url);
    } else {
        println!("{}", published.outcome.url);
    }
}

async fn handle_upload(config: &Config, cmd: &UploadCommand) -> anyhow::Result<()> {
    let manager = upload_manager(config, cmd.provider)?;
    let history = open_history(config);

    for file in &cmd.files {
        let request = UploadRequest::from_path(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        let published = publish(
            &manager,
            history.as_ref(),
            request,
            config.upload.rename,
            config.upload.dedupe,
        )
        .await
        .with_context(|| format!("failed to upload {}", file.display()))?;
        print_published(&published, cmd.markdown);
    }
    Ok(())
}

async fn handle_paste(config: &Config, cmd: &PasteCommand) -> anyhow::Result<()> {
    let manager = upload_manager(config, cmd.provider)?;
    let history = open_history(config);

    let bytes = tokio::task::spawn_blocking(read_clipboard_image).await??;
    let file_name = paste_file_name(&config.upload.paste_name, &bytes, Utc::now());
    let request = UploadRequest::from_bytes(bytes, file_name);

    let published = publish(
        &manager,
        history.as_ref(),
        request,
        config.upload.rename,
        config.upload.dedupe,
    )
    .await?;
    print_published(&published, cmd.markdown);
    Ok(())
}

async fn handle_rewrite(config: &Config, cmd: &RewriteCommand) -> anyhow::Result<()> {
    let note = tokio::fs::read_to_string(&cmd.note)
        .await
        .with_context(|| format!("failed to read {}", cmd.note.display()))?;
    let note_dir = cmd
        .note
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let images = find_local_images(&note);
    if images.is_empty() {
        info!("No local images in {}", cmd.note.display());
        if !cmd.in_place {
            print!("{note}");
        }
        return Ok(());
    }

    let manager = upload_manager(config, cmd.provider)?;
    let history = open_history(config);

    let mut replacements = Vec::with_capacity(images.len());
    for image in images {
        let path = image.resolve(note_dir);
        if !path.is_file() {
            warn!(target = %image.target, "Skipping missing image");
            continue;
        }
        let request = UploadRequest::from_path(&path).await?;
        let published = publish(
            &manager,
            history.as_ref(),
            request,
            config.upload.rename,
            config.upload.dedupe,
        )
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;
        info!(image = %image.target, url = %published.outcome.url, "Replaced image");
        replacements.push((image, published.outcome.url));
    }

    let rewritten = replace_images(&note, &replacements);
    if cmd.in_place {
        tokio::fs::write(&cmd.note, rewritten)
            .await
            .with_context(|| format!("failed to write {}", cmd.note.display()))?;
        eprintln!(
            "Rewrote {} image(s) in {}",
            replacements.len(),
            cmd.note.display()
        );
    } else {
        print!("{rewritten}");
    }
    Ok(())
}

fn print_records(records: &[eaglelink::UploadRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for record in records {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.id,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.provider,
            record.file_name,
            record.url
        );
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: HistoryCommand) -> anyhow::Result<()> {
    let history = History::open(config.database_path())?;

    match cmd {
        HistoryCommand::List { limit, json } => print_records(&history.recent(limit)?, json)?,
        HistoryCommand::Search { query, limit, json } => {
            print_records(&history.search(&query, limit)?, json)?;
        }
        HistoryCommand::Delete { id } => {
            if history.delete(id)? {
                println!("Deleted record {id}");
            } else {
                bail!("no upload record with id {id}");
            }
        }
        HistoryCommand::Prune { days } => {
            let days = days.unwrap_or(config.history.max_age_days);
            if days == 0 {
                bail!("pass --days or set history.max_age_days");
            }
            let max_age = std::time::Duration::from_secs(u64::from(days) * 24 * 60 * 60);
            let pruned = history.prune_older_than(max_age)?;
            println!("Pruned {pruned} record(s) older than {days} day(s)");
        }
        HistoryCommand::Stats { json } => {
            let stats = history.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Upload history");
                println!("--------------");
                println!("Database:  {}", history.path().display());
                println!(
                    "Size:      {}",
                    eaglelink::format::format_file_size(stats.db_size_bytes)
                );
                println!("Uploads:   {}", stats.total);
                for (provider, count) in &stats.by_provider {
                    println!("  {provider:<12}{count}");
                }
                if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                    println!("Oldest:    {}", oldest.format("%Y-%m-%d %H:%M"));
                    println!("Newest:    {}", newest.format("%Y-%m-%d %H:%M"));
                }
            }
        }
    }
    Ok(())
}

fn handle_config(
    config: &Config,
    config_path: Option<&Path>,
    cmd: &ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            } else {
                let order = config.upload.provider_order();
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Eagle]");
                println!("  Base URL:         {}", config.eagle.base_url);
                println!(
                    "  Library path:     {}",
                    config
                        .eagle
                        .library_path
                        .as_ref()
                        .map_or_else(|| "(from Eagle)".to_string(), |p| p.display().to_string())
                );
                println!("  Search limit:     {}", config.eagle.search_limit);
                println!();
                println!("[Link]");
                println!("  Style:            {}", config.link.style);
                println!("  Use thumbnail:    {}", config.link.use_thumbnail);
                println!("  Include tags:     {}", config.link.include_tags);
                println!();
                println!("[Upload]");
                if order.is_empty() {
                    println!("  Providers:        (none)");
                } else {
                    let names: Vec<String> = order.iter().map(ToString::to_string).collect();
                    println!("  Providers:        {}", names.join(" -> "));
                }
                println!("  Rename:           {:?}", config.upload.rename);
                println!("  Dedupe:           {}", config.upload.dedupe);
                println!();
                println!("[History]");
                println!("  Enabled:          {}", config.history.enabled);
                println!("  Database path:    {}", config.database_path().display());
                println!("  Max age (days):   {}", config.history.max_age_days);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.map_or_else(Config::default_config_path, Path::to_path_buf);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => handle_validate(file.as_deref().or(config_path))?,
    }
    Ok(())
}

fn handle_validate(file: Option<&Path>) -> anyhow::Result<()> {
    let path = file.map_or_else(Config::default_config_path, Path::to_path_buf);
    println!("Validating configuration: {}", path.display());
    Config::load_from(Some(path.clone()))
        .with_context(|| format!("configuration at {} is invalid", path.display()))?;
    println!("Configuration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_validate_accepts_good_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[link]\nstyle = \"wiki\"").unwrap();
        assert!(handle_validate(Some(file.path())).is_ok());
    }

    #[test]
    fn test_validate_fails_on_bad_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upload]\ndefault_provider = \"imgur\"").unwrap();

        let err = handle_validate(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("is invalid"));
        assert!(format!("{err:#}").contains("imgur"));
    }
}
