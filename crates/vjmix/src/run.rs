use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::{PreviewEvent, PreviewRuntime, RendererConfig, DEFAULT_FRAGMENT_SHADER};
use shaderstore::{ShaderStore, StoreSession};
use tracing_subscriber::EnvFilter;

use crate::cli::EditArgs;
use crate::config::VjmixConfig;
use crate::paths::AppPaths;
use crate::watcher::FileWatcher;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

pub fn edit(args: EditArgs, paths: &AppPaths) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(|| paths.config_file());
    let file_config = VjmixConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let renderer_config = renderer_config(&args, &file_config);
    tracing::debug!(
        config = %config_path.display(),
        data = %paths.data_dir().display(),
        ?renderer_config,
        "resolved vjmix settings"
    );

    let store = ShaderStore::open(paths.shader_store_dir())?;
    let (session, stored_text) = match args.id.as_deref() {
        Some(id) => {
            let (session, record) = StoreSession::open(store, id)
                .with_context(|| format!("failed to open saved shader {id}"))?;
            tracing::info!(id, title = %record.title, "editing saved shader");
            (session, record.code)
        }
        None => (StoreSession::new(store), DEFAULT_FRAGMENT_SHADER.to_string()),
    };

    let initial_text = match args.file.as_deref() {
        Some(path) => seed_file(path, &stored_text)?,
        None => stored_text,
    };

    let runtime = PreviewRuntime::new(renderer_config)?;
    let _watch = match args.file {
        Some(path) => {
            tracing::info!(path = %path.display(), "watching shader file");
            let proxy = runtime.proxy();
            let watcher = FileWatcher::new(path, initial_text.clone());
            Some(watcher.spawn(file_config.watch_debounce(), move |text| {
                proxy.send_event(PreviewEvent::SourceChanged(text)).is_ok()
            })?)
        }
        None => None,
    };

    runtime.run(initial_text, session)
}

fn renderer_config(args: &EditArgs, file_config: &VjmixConfig) -> RendererConfig {
    let mut config = RendererConfig::default();
    file_config.apply(&mut config);
    if let Some(size) = args.size {
        config.inline_size = size;
    }
    if let Some(antialias) = args.antialias {
        config.antialiasing = antialias;
    }
    config.open_secondary = args.open_window;
    config
}

/// Reads the watched file, creating it from `fallback` when it does not exist.
fn seed_file(path: &Path, fallback: &str) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::write(path, fallback)
                .with_context(|| format!("failed to create {}", path.display()))?;
            tracing::info!(path = %path.display(), "created shader file");
            Ok(fallback.to_string())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
