//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::autotext::PostfixKey;
use crate::context::LayoutId;
use crate::keys::Key;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Modifier key that acts as autotext postfix
    pub postfix_key: PostfixKey,

    /// Extra characters treated as word characters by autotext
    pub word_chars: String,

    /// Layout assumed for key events that carry none
    pub default_layout: LayoutId,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Self::from_vars(&home, |name| std::env::var(name).ok())
    }

    fn from_vars(home: &str, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("trigger-daemon");

        let socket_path = match var("TRIGGERD_SOCKET") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("daemon.sock"),
        };

        let postfix_key = match var("TRIGGERD_POSTFIX_KEY") {
            Some(name) => {
                let key = Key::from_name(&name)
                    .with_context(|| format!("TRIGGERD_POSTFIX_KEY: unknown key {name:?}"))?;
                PostfixKey::new(key).context("TRIGGERD_POSTFIX_KEY")?
            }
            None => PostfixKey::default(),
        };

        let default_layout = match var("TRIGGERD_LAYOUT") {
            Some(s) => {
                let hex = s.trim_start_matches("0x");
                let id = u32::from_str_radix(hex, 16)
                    .with_context(|| format!("TRIGGERD_LAYOUT: invalid layout id {s:?}"))?;
                LayoutId(id)
            }
            None => LayoutId::US,
        };

        Ok(Self {
            socket_path,
            data_dir,
            postfix_key,
            word_chars: var("TRIGGERD_WORD_CHARS").unwrap_or_default(),
            default_layout,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
