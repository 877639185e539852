//! The cleanup target catalog.
//!
//! Each target names one directory, its category, and its safety policy.
//! The catalog is data: the executor never hardcodes a path. Targets
//! marked unsafe stay listed so analysis can report them, but deletion
//! requires explicit opt-in. Sudo-gated targets are never cleaned by this
//! process at all.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Categories of cleanable items.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CleanupCategory {
    SystemCache,
    UserCache,
    BrowserCache,
    DevCache,
    Logs,
    TempFiles,
    Trash,
    Downloads,
    Xcode,
    IosDevice,
}

impl CleanupCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemCache => "system_cache",
            Self::UserCache => "user_cache",
            Self::BrowserCache => "browser_cache",
            Self::DevCache => "dev_cache",
            Self::Logs => "logs",
            Self::TempFiles => "temp_files",
            Self::Trash => "trash",
            Self::Downloads => "downloads",
            Self::Xcode => "xcode",
            Self::IosDevice => "ios_device",
        }
    }
}

impl fmt::Display for CleanupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system_cache" => Ok(Self::SystemCache),
            "user_cache" => Ok(Self::UserCache),
            "browser_cache" => Ok(Self::BrowserCache),
            "dev_cache" => Ok(Self::DevCache),
            "logs" => Ok(Self::Logs),
            "temp_files" => Ok(Self::TempFiles),
            "trash" => Ok(Self::Trash),
            "downloads" => Ok(Self::Downloads),
            "xcode" => Ok(Self::Xcode),
            "ios_device" => Ok(Self::IosDevice),
            other => Err(format!("unknown cleanup category '{other}'")),
        }
    }
}

/// One cleanable location and its policy.
#[derive(Debug, Clone)]
pub struct CleanupTarget {
    pub path: PathBuf,
    pub category: CleanupCategory,
    pub description: &'static str,
    /// Eligible for deletion without explicit opt-in
    pub safe_to_delete: bool,
    /// Needs elevated privileges; never cleaned by this process
    pub requires_sudo: bool,
    /// Only delete files older than this many days (0 = no age filter)
    pub min_age_days: u32,
    /// Substrings that exempt a path from deletion
    pub exclude_patterns: &'static [&'static str],
}

impl CleanupTarget {
    fn new(path: PathBuf, category: CleanupCategory, description: &'static str) -> Self {
        Self {
            path,
            category,
            description,
            safe_to_delete: true,
            requires_sudo: false,
            min_age_days: 0,
            exclude_patterns: &[],
        }
    }

    fn unsafe_to_delete(mut self) -> Self {
        self.safe_to_delete = false;
        self
    }

    fn sudo(mut self) -> Self {
        self.requires_sudo = true;
        self
    }

    fn min_age(mut self, days: u32) -> Self {
        self.min_age_days = days;
        self
    }

    fn exclude(mut self, patterns: &'static [&'static str]) -> Self {
        self.exclude_patterns = patterns;
        self
    }
}

/// The built-in catalog, rooted at `home`.
pub fn default_targets(home: &Path) -> Vec<CleanupTarget> {
    use CleanupCategory::*;

    let h = |tail: &str| home.join(tail);

    vec![
        CleanupTarget::new(h("Library/Caches"), UserCache, "User application caches")
            .exclude(&["com.apple.", "CloudKit", "com.spotify."]),
        // Browser caches
        CleanupTarget::new(
            h("Library/Caches/Google/Chrome"),
            BrowserCache,
            "Chrome browser cache",
        ),
        CleanupTarget::new(
            h("Library/Caches/com.google.Chrome"),
            BrowserCache,
            "Chrome app cache",
        ),
        CleanupTarget::new(
            h("Library/Caches/Firefox"),
            BrowserCache,
            "Firefox browser cache",
        ),
        CleanupTarget::new(
            h("Library/Caches/com.apple.Safari"),
            BrowserCache,
            "Safari browser cache",
        ),
        CleanupTarget::new(
            h("Library/Safari/LocalStorage"),
            BrowserCache,
            "Safari local storage",
        )
        .min_age(7),
        // Development caches
        CleanupTarget::new(h(".npm/_cacache"), DevCache, "NPM cache"),
        CleanupTarget::new(h(".yarn/cache"), DevCache, "Yarn cache"),
        CleanupTarget::new(h(".pnpm-store"), DevCache, "PNPM store").min_age(30),
        CleanupTarget::new(h(".cache/pip"), DevCache, "Pip cache"),
        CleanupTarget::new(h(".cargo/registry/cache"), DevCache, "Cargo registry cache"),
        CleanupTarget::new(h(".gradle/caches"), DevCache, "Gradle caches"),
        CleanupTarget::new(h(".m2/repository"), DevCache, "Maven repository cache").min_age(60),
        CleanupTarget::new(h("go/pkg/mod/cache"), DevCache, "Go module cache"),
        CleanupTarget::new(h(".cache/homebrew"), DevCache, "Homebrew cache"),
        CleanupTarget::new(
            PathBuf::from("/usr/local/Homebrew/Library/Taps"),
            DevCache,
            "Homebrew taps cache",
        )
        .unsafe_to_delete(),
        // Logs
        CleanupTarget::new(h("Library/Logs"), Logs, "User application logs")
            .min_age(7)
            .exclude(&["DiagnosticReports"]),
        CleanupTarget::new(PathBuf::from("/var/log"), Logs, "System logs")
            .sudo()
            .min_age(14),
        CleanupTarget::new(
            h("Library/Logs/DiagnosticReports"),
            Logs,
            "Crash reports",
        )
        .min_age(30),
        // Temporary files
        CleanupTarget::new(PathBuf::from("/tmp"), TempFiles, "System temp files").min_age(1),
        CleanupTarget::new(
            PathBuf::from("/private/var/folders"),
            TempFiles,
            "Private temp folders",
        )
        .sudo()
        .min_age(3),
        CleanupTarget::new(
            h("Library/Application Support/CrashReporter"),
            TempFiles,
            "Crash reporter data",
        )
        .min_age(7),
        // Xcode
        CleanupTarget::new(
            h("Library/Developer/Xcode/DerivedData"),
            Xcode,
            "Xcode derived data",
        ),
        CleanupTarget::new(
            h("Library/Developer/Xcode/Archives"),
            Xcode,
            "Xcode archives",
        )
        .min_age(30),
        CleanupTarget::new(
            h("Library/Developer/Xcode/iOS DeviceSupport"),
            IosDevice,
            "iOS device support files",
        )
        .min_age(60),
        CleanupTarget::new(
            h("Library/Developer/CoreSimulator/Caches"),
            Xcode,
            "iOS Simulator caches",
        ),
        // Trash and Downloads
        CleanupTarget::new(h(".Trash"), Trash, "User trash").min_age(7),
        CleanupTarget::new(h("Downloads"), Downloads, "Downloads folder")
            .unsafe_to_delete()
            .min_age(30),
        // Docker
        CleanupTarget::new(
            h("Library/Containers/com.docker.docker/Data/vms"),
            DevCache,
            "Docker VM data",
        )
        .unsafe_to_delete(),
        // Editors
        CleanupTarget::new(
            h("Library/Application Support/Code/Cache"),
            DevCache,
            "VS Code cache",
        ),
        CleanupTarget::new(
            h("Library/Application Support/Code/CachedExtensions"),
            DevCache,
            "VS Code extension cache",
        ),
        CleanupTarget::new(
            h("Library/Application Support/Cursor/Cache"),
            DevCache,
            "Cursor IDE cache",
        ),
        // Per-app caches
        CleanupTarget::new(
            h("Library/Application Support/Spotify/PersistentCache"),
            UserCache,
            "Spotify cache",
        ),
        CleanupTarget::new(
            h("Library/Application Support/Slack/Cache"),
            UserCache,
            "Slack cache",
        ),
        CleanupTarget::new(
            h("Library/Application Support/Slack/Service Worker/CacheStorage"),
            UserCache,
            "Slack service worker cache",
        ),
        CleanupTarget::new(
            h("Library/Application Support/discord/Cache"),
            UserCache,
            "Discord cache",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_rooted_at_home() {
        let targets = default_targets(Path::new("/home/alex"));
        assert!(targets
            .iter()
            .any(|t| t.path == Path::new("/home/alex/Library/Caches")));
    }

    #[test]
    fn sudo_targets_are_marked() {
        let targets = default_targets(Path::new("/home/alex"));
        let sudo: Vec<_> = targets.iter().filter(|t| t.requires_sudo).collect();
        assert_eq!(sudo.len(), 2);
        assert!(sudo.iter().all(|t| t.path.is_absolute()));
    }

    #[test]
    fn downloads_requires_opt_in() {
        let targets = default_targets(Path::new("/home/alex"));
        let downloads = targets
            .iter()
            .find(|t| t.category == CleanupCategory::Downloads)
            .expect("downloads target");
        assert!(!downloads.safe_to_delete);
        assert_eq!(downloads.min_age_days, 30);
    }

    #[test]
    fn category_parses_from_cli_names() {
        assert_eq!(
            "dev_cache".parse::<CleanupCategory>(),
            Ok(CleanupCategory::DevCache)
        );
        assert_eq!(
            "XCODE".parse::<CleanupCategory>(),
            Ok(CleanupCategory::Xcode)
        );
        assert!("attic".parse::<CleanupCategory>().is_err());
    }
}
