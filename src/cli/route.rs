//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_config_output, format_merge_output, format_refresh_output, OutputFormat,
};
use crate::config::{ConfigLoader, FramewireConfig};
use crate::coordinator::{FrameCoordinator, UpdateOutcome};
use crate::dom::{Document, FrameSelector};
use crate::error::FrameError;
use crate::fetch::{FetchOptions, Method};
use crate::page::Page;
use crate::runtime::FrameRuntime;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Runtime context for CLI execution: loaded configuration and an async executor.
pub struct RunContext {
    config: FramewireConfig,
    workspace_root: PathBuf,
    executor: Runtime,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, FrameError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.ensure_valid()?;
        let executor = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| FrameError::Config(format!("Failed to start async runtime: {}", e)))?;
        Ok(Self {
            config,
            workspace_root,
            executor,
        })
    }

    pub fn config(&self) -> &FramewireConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, FrameError> {
        let started = Instant::now();
        let result = match command {
            Commands::Refresh {
                page,
                frame,
                url,
                method,
                data,
                format,
            } => self.handle_refresh(page, frame, url, method, data.as_deref(), format),
            Commands::Merge {
                current,
                new,
                frame,
                format,
            } => self.handle_merge(current, new, frame, format),
            Commands::Config { format } => format_config_output(&self.config, format),
        };
        info!(
            command = crate::cli::command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn handle_refresh(
        &self,
        page: &Path,
        frame: &str,
        url: &str,
        method: &str,
        data: Option<&str>,
        format: &str,
    ) -> Result<String, FrameError> {
        let format: OutputFormat = format.parse()?;
        let selector: FrameSelector = frame.parse()?;
        let method: Method = method.parse()?;
        let options = FetchOptions {
            method,
            body: data.map(str::to_string),
            headers: Vec::new(),
        };

        let document = self.read_page(page)?;
        let runtime = FrameRuntime::from_config(document, self.config.clone())?;
        let outcome = self
            .executor
            .block_on(runtime.refresh_frame(&selector, url, options))?;

        let guard = runtime.page().lock();
        let html = guard.document.outer_html(guard.document.root());
        Ok(format_refresh_output(
            &html,
            &outcome,
            guard.document.mutation_count(),
            format,
        ))
    }

    fn handle_merge(
        &self,
        current: &Path,
        new: &Path,
        frame: &str,
        format: &str,
    ) -> Result<String, FrameError> {
        let format: OutputFormat = format.parse()?;
        let selector: FrameSelector = frame.parse()?;

        let mut live = self.read_page(current)?;
        live.set_nonce_meta_name(self.config.markup.nonce_meta.clone());
        let fresh = self.read_page(new)?;
        let source = selector.locate_in(&fresh, fresh.body()).ok_or_else(|| {
            FrameError::Protocol(format!("Frame {} missing from {}", selector, new.display()))
        })?;
        let produced = live
            .import(&fresh, source)
            .ok_or_else(|| FrameError::NotFound(selector.to_string()))?;
        debug!(frame = %selector, "Merging frame offline");

        let page = Page::new(live).shared();
        let coordinator = FrameCoordinator::new(page.clone(), self.config.markup.clone());
        let outcome: UpdateOutcome = self.executor.block_on(
            coordinator.update_frame(&selector, move |_, _| async move { Ok(Some(produced)) }),
        )?;

        let guard = page.lock();
        let html = guard.document.outer_html(guard.document.root());
        Ok(format_merge_output(
            &html,
            &outcome,
            guard.document.mutation_count(),
            format,
        ))
    }

    fn read_page(&self, path: &Path) -> Result<Document, FrameError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };
        let markup = std::fs::read_to_string(&path).map_err(|e| {
            FrameError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Document::parse(&markup)?)
    }
}
