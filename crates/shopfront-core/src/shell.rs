//! Window and lifecycle policy for the desktop shell.
//!
//! The shell opens exactly one window on the configured address. The page in
//! that window never gets access to host capabilities; `WindowSpec` carries
//! that guarantee as part of its type.

use anyhow::Result;
use reqwest::Url;

use crate::config::ShellConfig;

/// Separation between host and page script contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// The page runs in its own context and cannot reach host APIs.
    Enabled,
}

impl Isolation {
    pub fn is_enabled(self) -> bool {
        matches!(self, Isolation::Enabled)
    }
}

/// Everything needed to create the shell window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub width: u32,
    pub height: u32,
    pub title: String,
    url: Url,
    isolation: Isolation,
}

impl WindowSpec {
    pub fn from_config(config: &ShellConfig) -> Result<Self> {
        Ok(Self {
            width: config.window.width,
            height: config.window.height,
            title: config.window.title.clone(),
            url: config.address_url()?,
            isolation: Isolation::Enabled,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }
}

/// What to do once the last window is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    Quit,
    /// macOS apps stay alive without windows.
    KeepRunning,
}

impl ClosePolicy {
    /// `os` is a `std::env::consts::OS` value.
    pub fn for_platform(os: &str) -> Self {
        if os == "macos" {
            ClosePolicy::KeepRunning
        } else {
            ClosePolicy::Quit
        }
    }

    pub fn current() -> Self {
        Self::for_platform(std::env::consts::OS)
    }

    pub fn quits_when_all_closed(self) -> bool {
        self == ClosePolicy::Quit
    }
}
