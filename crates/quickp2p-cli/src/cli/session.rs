//! Executes CLI commands against a profile runtime.
//!
//! Input and output are injected so the confirmation flow can be driven from
//! tests. After a confirmed reset the session drops its runtime and builds a
//! new one from the same store, the terminal equivalent of reloading the app.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use quickp2p_core::constants::EXPORT_FILE_NAME;
use quickp2p_core::{
    notifications_effective, open_store, ColorMode, PersistedStore, PortabilityCodec,
    ProfileConfig, ProfileRuntime, SettingsPatch, SettingsRecord,
};
use serde_json::json;

/// Word the user has to type to confirm a reset
pub const RESET_CONFIRMATION: &str = "delete";

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Print the profile and the effective notification state
    Show,
    /// Change preferences; unset fields stay as they are
    Set(SetArgs),
    /// Write a portable profile export to `out` (stdout when absent)
    Export { out: Option<PathBuf> },
    /// Replace the profile with an export read from `file`
    Import { file: PathBuf },
    /// Delete all local profile data, asking first unless `yes`
    Reset { yes: bool },
}

#[derive(Debug, Clone, Default)]
pub struct SetArgs {
    pub sound: Option<bool>,
    pub notifications: Option<bool>,
    pub typing: Option<bool>,
    pub color_mode: Option<ColorMode>,
    pub username: Option<String>,
    pub clear_username: bool,
}

impl SetArgs {
    pub fn to_patch(&self) -> SettingsPatch {
        let mut patch = SettingsPatch::new();
        patch.play_sound_on_new_message = self.sound;
        patch.show_notification_on_new_message = self.notifications;
        patch.show_active_typing_status = self.typing;
        patch.color_mode = self.color_mode;
        if self.clear_username {
            patch.custom_username = Some(None);
        } else if let Some(name) = &self.username {
            patch.custom_username = Some(Some(name.clone()));
        }
        patch
    }
}

pub struct Session {
    config: ProfileConfig,
    store: Arc<dyn PersistedStore>,
    runtime: ProfileRuntime,
    pretty: bool,
}

impl Session {
    pub async fn open(config: ProfileConfig, pretty: bool) -> Self {
        let store = open_store(&config);
        Self::with_store(config, store, pretty).await
    }

    pub async fn with_store(
        config: ProfileConfig,
        store: Arc<dyn PersistedStore>,
        pretty: bool,
    ) -> Self {
        let runtime = ProfileRuntime::with_store(config.clone(), store.clone()).await;
        Self {
            config,
            store,
            runtime,
            pretty,
        }
    }

    pub fn runtime(&self) -> &ProfileRuntime {
        &self.runtime
    }

    pub async fn run<R: BufRead, W: Write, E: Write>(
        &mut self,
        command: CliCommand,
        input: &mut R,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        match command {
            CliCommand::Show => self.show(out).await,
            CliCommand::Set(args) => self.set(&args, out).await,
            CliCommand::Export { out: path } => self.export(path, out, err),
            CliCommand::Import { file } => self.import(&file, out, err).await,
            CliCommand::Reset { yes } => self.reset(yes, input, out, err).await,
        }
    }

    async fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        let record = self.runtime.settings().get();
        let notifications = self.runtime.notifications();
        let permission = notifications.request_permission().await;
        let effective = notifications_effective(&record, permission);

        let value = json!({
            "displayName": record.display_name(),
            "userId": record.user_id,
            "settings": record,
            "notifications": {
                "permission": permission,
                "effective": effective,
            },
        });
        self.print_json(out, &value)
    }

    async fn set<W: Write>(&self, args: &SetArgs, out: &mut W) -> Result<()> {
        let record = self
            .runtime
            .settings()
            .update(args.to_patch())
            .await
            .context("Failed to update settings")?;
        self.print_record(out, &record)
    }

    fn export<W: Write, E: Write>(
        &self,
        path: Option<PathBuf>,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        let payload = PortabilityCodec::export(&self.runtime.settings().get())
            .context("Failed to encode profile")?;

        writeln!(
            err,
            "Warning: the export contains your unique verification keys. Do not share it with anyone."
        )?;

        match path {
            Some(path) => {
                let path = if path.is_dir() { path.join(EXPORT_FILE_NAME) } else { path };
                std::fs::write(&path, payload.as_bytes())
                    .with_context(|| format!("Failed to write export: {}", path.display()))?;
                writeln!(err, "Profile exported to {}", path.display())?;
            }
            None => {
                out.write_all(payload.as_bytes())?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    async fn import<W: Write, E: Write>(
        &self,
        file: &Path,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read import file: {}", file.display()))?;
        let settings = self.runtime.settings();
        let record = PortabilityCodec::import_into(&settings, &bytes).await?;

        writeln!(err, "Profile successfully imported")?;
        self.print_record(out, &record)
    }

    async fn reset<R: BufRead, W: Write, E: Write>(
        &mut self,
        yes: bool,
        input: &mut R,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        let gate = self.runtime.deletion();
        gate.request_deletion()?;

        if !yes {
            let name = self.runtime.settings().get().display_name();
            writeln!(
                err,
                "This will change your user name from {} to a new, randomly-assigned name \
                 and reset all of your saved preferences.",
                name
            )?;
            write!(err, "Type '{}' to confirm: ", RESET_CONFIRMATION)?;
            err.flush()?;

            let mut answer = String::new();
            input.read_line(&mut answer)?;
            if answer.trim() != RESET_CONFIRMATION {
                gate.cancel()?;
                writeln!(err, "Cancelled, nothing was deleted")?;
                return Ok(());
            }
        }

        gate.confirm().await?;

        if self.runtime.restart_requested() {
            self.restart().await;
        }

        let record = self.runtime.settings().get();
        writeln!(err, "Profile deleted. New user name: {}", record.display_name())?;
        self.print_record(out, &record)
    }

    /// Drop all in-memory state and rebuild it from the store
    async fn restart(&mut self) {
        tracing::info!("session: restarting profile runtime");
        self.runtime = ProfileRuntime::with_store(self.config.clone(), self.store.clone()).await;
    }

    fn print_record<W: Write>(&self, out: &mut W, record: &SettingsRecord) -> Result<()> {
        self.print_json(out, &serde_json::to_value(record)?)
    }

    fn print_json<W: Write>(&self, out: &mut W, value: &serde_json::Value) -> Result<()> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        writeln!(out, "{}", text)?;
        Ok(())
    }
}
