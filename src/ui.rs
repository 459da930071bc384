// UI layer: the interactive upload session built on `dialoguer` prompts.
// Every remote call runs behind an `indicatif` spinner.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Editor, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::api::YouTubeApi;
use crate::args::Cli;
use crate::auth::{AuthorizationFlow, CodePrompt, ConsolePrompt, LoopbackPrompt, OAuthServer};
use crate::catalog::{VideoCatalogCache, VideoSummary};
use crate::category::{self, PrivacyStatus};
use crate::client::{AuthenticatedHandle, CredentialedClient};
use crate::config::AppConfig;
use crate::defaults::FormDefaults;
use crate::token::TokenStore;
use crate::upload::{self, ThumbnailOutcome, UploadRequest, UploadResult, VideoOutcome};

/// Full session: credentials, optional reuse of a previous upload's
/// metadata, the form, and the upload itself.
pub fn upload_session(config: &AppConfig, args: &Cli) -> Result<()> {
    let video_path = args
        .video
        .as_deref()
        .context("a video file is required")?;
    check_is_file(video_path)?;
    if let Some(thumbnail) = args.thumbnail.as_deref() {
        check_is_file(thumbnail)?;
    }

    let handle = acquire_credentials(config, args.loopback)?;
    let api = YouTubeApi::new(handle).context("Failed to build HTTP client")?;

    let catalog = VideoCatalogCache::new(config.catalog_path(), &api);
    let progress = spinner("Fetching your latest uploads...")?;
    let latest = catalog.list(args.read_cache);
    progress.finish_and_clear();
    let latest = latest.context("Failed to list previous uploads")?;

    let mut defaults = FormDefaults::load(&config.defaults_path(), Local::now())
        .context("Failed to read upload defaults")?;
    if let Some(previous) = pick_previous(&latest)? {
        let progress = spinner("Fetching video details...")?;
        let extras = catalog.fetch_extras(&previous.video_id);
        progress.finish_and_clear();
        let extras = extras.context("Failed to fetch details of the selected video")?;

        defaults.title = previous.title.clone();
        defaults.description = previous.description.clone();
        defaults.tags = extras.tags;
        defaults.category_index = category::index_of(extras.category).unwrap_or(0);
    }

    let request = fill_form(video_path, args.thumbnail.clone(), defaults)?;
    if !Confirm::new()
        .with_prompt("Upload now?")
        .default(true)
        .interact()?
    {
        println!("Upload cancelled.");
        return Ok(());
    }

    let progress = spinner("Uploading...")?;
    let result = upload::upload(&api, &request);
    progress.finish_and_clear();
    report(&result)
}

fn acquire_credentials(config: &AppConfig, loopback: bool) -> Result<AuthenticatedHandle> {
    let client_config = config.load_client_config()?;
    let server = OAuthServer::new(client_config).context("Failed to build HTTP client")?;
    let store = TokenStore::new(config.token_path());

    if loopback {
        let prompt = LoopbackPrompt::bind().context("Failed to listen for the authorization redirect")?;
        acquire_with(store, server, prompt, config)
    } else {
        acquire_with(store, server, ConsolePrompt, config)
    }
}

fn acquire_with<P: CodePrompt>(
    store: TokenStore,
    server: OAuthServer,
    prompt: P,
    config: &AppConfig,
) -> Result<AuthenticatedHandle> {
    let client = CredentialedClient::new(
        store,
        AuthorizationFlow::new(server, prompt),
        config.api_base_url.clone(),
    );
    client.acquire().context("Could not obtain YouTube credentials")
}

/// Offer the latest uploads as templates. `None` means start from the
/// defaults.
fn pick_previous(latest: &[VideoSummary]) -> Result<Option<&VideoSummary>> {
    if latest.is_empty() {
        return Ok(None);
    }

    let mut items: Vec<String> = latest.iter().map(ToString::to_string).collect();
    items.push("None".to_string());
    let selection = Select::new()
        .with_prompt("Reuse the details of a previous upload")
        .items(&items)
        .default(items.len() - 1)
        .interact()?;

    Ok(latest.get(selection))
}

/// Collect the upload metadata, starting from `defaults`.
fn fill_form(
    video_path: &Path,
    thumbnail_path: Option<PathBuf>,
    defaults: FormDefaults,
) -> Result<UploadRequest> {
    println!("Video file:     {}", video_path.display());
    if let Some(thumbnail) = &thumbnail_path {
        println!("Thumbnail file: {}", thumbnail.display());
    }

    let title: String = Input::new()
        .with_prompt("Title")
        .with_initial_text(defaults.title.clone())
        .interact_text()?;

    let description = if Confirm::new()
        .with_prompt("Edit the description in your editor?")
        .default(false)
        .interact()?
    {
        Editor::new()
            .extension(".txt")
            .edit(&defaults.description)?
            .unwrap_or(defaults.description)
    } else {
        defaults.description
    };

    let tags: String = Input::new()
        .with_prompt("Tags (comma-separated)")
        .with_initial_text(defaults.tags.join(","))
        .allow_empty(true)
        .interact_text()?;

    let categories: Vec<&str> = category::names().collect();
    let category_index = Select::new()
        .with_prompt("Category")
        .items(&categories)
        .default(defaults.category_index.min(categories.len() - 1))
        .interact()?;

    let labels: Vec<&str> = PrivacyStatus::ALL.iter().map(|s| s.label()).collect();
    let privacy_index = Select::new()
        .with_prompt("Privacy status")
        .items(&labels)
        .default(defaults.privacy_index.min(labels.len() - 1))
        .interact()?;

    let publish_at: String = Input::new()
        .with_prompt("Publish at (empty to publish now)")
        .with_initial_text(defaults.publish_at)
        .allow_empty(true)
        .interact_text()?;

    Ok(UploadRequest {
        video_path: video_path.to_path_buf(),
        thumbnail_path,
        title,
        description,
        tags: parse_tags(&tags),
        category: categories[category_index].to_string(),
        privacy_status: PrivacyStatus::ALL[privacy_index],
        publish_at: Some(publish_at).filter(|p| !p.trim().is_empty()),
    })
}

/// Split a comma-separated tag field, dropping blank entries.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// The path must exist and must not be a directory.
pub fn check_is_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("The file {} does not exist", path.display()))?;
    if metadata.is_dir() {
        bail!("{} is a directory", path.display());
    }
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

/// Print both outcomes. Only a failed video step is an error for the run.
fn report(result: &UploadResult) -> Result<()> {
    match &result.video {
        VideoOutcome::Failed(err) => {
            eprintln!("{}", format!("There was an error in the video upload: {err}").red());
            bail!("video upload failed");
        }
        VideoOutcome::Created { video_id } => {
            info!("Upload of {video_id} finished");
            println!(
                "{}",
                format!("Video uploaded successfully: https://youtu.be/{video_id}").green()
            );
        }
    }

    match &result.thumbnail {
        Some(ThumbnailOutcome::Succeeded) => println!("{}", "Thumbnail added successfully".green()),
        Some(ThumbnailOutcome::Failed(err)) => {
            eprintln!("{}", format!("There was an error in the thumbnail upload: {err}").yellow())
        }
        Some(ThumbnailOutcome::Skipped) | None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tags_are_trimmed_and_blank_ones_dropped() {
        assert_eq!(
            parse_tags(" rust, cli ,,tutorial ,"),
            vec!["rust".to_string(), "cli".to_string(), "tutorial".to_string()]
        );
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn check_is_file_rejects_missing_and_directories() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        assert!(check_is_file(&file).is_ok());
        assert!(check_is_file(dir.path()).is_err());
        assert!(check_is_file(&dir.path().join("missing.mp4")).is_err());
    }

    #[test]
    fn spinner_can_be_started_repeatedly() {
        for message in ["Fetching...", "Uploading..."] {
            let progress = spinner(message).unwrap();
            assert_eq!(progress.message(), message);
            progress.finish_and_clear();
        }
    }
}
