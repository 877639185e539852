//! Process classification and the protection rule.
//!
//! Classification is a pure function of (name, command line): ordered,
//! case-insensitive regex matching against hand-curated per-category
//! pattern tables. Protected categories are tested before killable ones
//! and the first category with a matching pattern wins.
//!
//! Protection is a separate binary decision, deliberately not folded into
//! the score: a protected process is never a termination candidate no
//! matter how much it consumes.

use std::collections::HashSet;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Closed set of process categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCategory {
    SystemCritical,
    Development,
    Terminal,
    Browser,
    Communication,
    CloudSync,
    Media,
    Background,
    Unknown,
}

impl ProcessCategory {
    /// Categories that carry a hard protection guarantee.
    pub fn is_always_protected(&self) -> bool {
        matches!(
            self,
            Self::SystemCritical | Self::Development | Self::Terminal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemCritical => "system_critical",
            Self::Development => "development",
            Self::Terminal => "terminal",
            Self::Browser => "browser",
            Self::Communication => "communication",
            Self::CloudSync => "cloud_sync",
            Self::Media => "media",
            Self::Background => "background",
            Self::Unknown => "unknown",
        }
    }
}

// Pattern tables are configuration data, not logic. Order matters twice:
// protected categories are evaluated before killable ones, and within the
// list the first matching category wins.

const SYSTEM_CRITICAL_PATTERNS: &[&str] = &[
    r"kernel_task", r"launchd", r"SystemUIServer", r"Finder",
    r"Dock", r"loginwindow", r"WindowServer", r"airportd",
    r"bluetoothd", r"coreaudiod", r"cfprefsd", r"diskarbitrationd",
    r"mds$", r"notifyd", r"securityd", r"trustd", r"usbd",
    r"powerd", r"fseventsd", r"coreduetd", r"symptomsd",
    r"apsd", r"cloudd", r"nsurlsessiond", r"CommCenter",
    r"UserEventAgent", r"syslogd", r"configd", r"opendirectoryd",
];

const DEVELOPMENT_PATTERNS: &[&str] = &[
    // IDEs and editors
    r"Code$", r"Code Helper", r"Code - Insiders", r"code-server",
    r"Cursor", r"cursor",
    r"IntelliJ", r"WebStorm", r"PyCharm", r"RubyMine", r"GoLand",
    r"DataGrip", r"Rider", r"CLion", r"PhpStorm", r"AppCode",
    r"Xcode", r"Android Studio", r"Sublime", r"TextEdit",
    r"Nova", r"BBEdit", r"Atom", r"Brackets",
    r"vim", r"nvim", r"emacs", r"nano", r"micro",
    // Toolchains and daemons
    r"node$", r"npm", r"yarn", r"pnpm", r"bun",
    r"python[23]?$", r"pip", r"ruby", r"gem", r"bundle",
    r"java$", r"javac", r"gradle", r"maven", r"mvn",
    r"go$", r"cargo", r"rustc", r"rustup",
    r"git$", r"git-", r"gh$",
    r"docker", r"kubectl", r"helm", r"terraform",
    r"aws$", r"gcloud", r"az$",
    r"postgres", r"mysql", r"redis", r"mongo",
    r"nginx", r"apache",
    r"electron",
    r"claude", r"copilot",
    // Language servers
    r"typescript-language", r"pylsp", r"gopls", r"rust-analyzer",
];

const TERMINAL_PATTERNS: &[&str] = &[
    r"Terminal$", r"iTerm", r"Hyper", r"Alacritty", r"kitty",
    r"WezTerm", r"Warp", r"Tabby", r"Terminus",
    r"zsh$", r"bash$", r"sh$", r"fish$", r"tcsh$", r"csh$",
    r"ssh$", r"sshd", r"tmux", r"screen", r"mosh",
];

const BROWSER_PATTERNS: &[&str] = &[
    r"Chrome Helper", r"Google Chrome Helper",
    r"Safari Web Content", r"Safari Networking",
    r"Firefox", r"firefox-bin",
    r"Brave Browser", r"Microsoft Edge",
    r"Arc Helper", r"Opera",
];

const COMMUNICATION_PATTERNS: &[&str] = &[
    r"Slack Helper", r"Discord Helper", r"Teams",
    r"WhatsApp", r"Telegram", r"Signal", r"Messages",
    r"Zoom", r"Skype", r"FaceTime",
];

const CLOUD_SYNC_PATTERNS: &[&str] = &[
    r"Dropbox", r"Google Drive", r"OneDrive",
    r"iCloud", r"Box Sync", r"Sync",
];

const MEDIA_PATTERNS: &[&str] = &[
    r"Spotify Helper", r"Music$", r"iTunes",
    r"Photos$", r"Preview$", r"QuickTime",
    r"VLC", r"IINA",
];

const BACKGROUND_PATTERNS: &[&str] = &[
    r"mds_stores", r"photoanalysisd", r"photolibraryd",
    r"suggestd", r"com\.apple\.photos", r"mediaanalysisd",
    r"bird$", r"commerce", r"ReportCrash",
    r"spindump", r"sysdiagnose", r"tailspind",
    r"analyticsd", r"diagnosticd",
];

/// Evaluation order for classification: protected trio first.
const CATEGORY_TABLE: &[(ProcessCategory, &[&str])] = &[
    (ProcessCategory::SystemCritical, SYSTEM_CRITICAL_PATTERNS),
    (ProcessCategory::Development, DEVELOPMENT_PATTERNS),
    (ProcessCategory::Terminal, TERMINAL_PATTERNS),
    (ProcessCategory::Browser, BROWSER_PATTERNS),
    (ProcessCategory::Communication, COMMUNICATION_PATTERNS),
    (ProcessCategory::CloudSync, CLOUD_SYNC_PATTERNS),
    (ProcessCategory::Media, MEDIA_PATTERNS),
    (ProcessCategory::Background, BACKGROUND_PATTERNS),
];

/// Compiled, ordered classification tables.
pub struct Classifier {
    sets: Vec<(ProcessCategory, RegexSet)>,
}

impl Classifier {
    pub fn new() -> Self {
        let sets = CATEGORY_TABLE
            .iter()
            .map(|(category, patterns)| {
                let case_insensitive: Vec<String> =
                    patterns.iter().map(|p| format!("(?i){p}")).collect();
                let set = RegexSet::new(&case_insensitive)
                    .unwrap_or_else(|e| panic!("invalid pattern table for {category:?}: {e}"));
                (*category, set)
            })
            .collect();
        Self { sets }
    }

    /// Classify a process by name and command line. Pure: depends only on
    /// its arguments and the static tables.
    pub fn classify(&self, name: &str, cmdline: &str) -> ProcessCategory {
        // Anchored patterns ("mds$") must be able to match a bare name, so
        // the separator is only inserted when a command line is present.
        let search_text = if cmdline.is_empty() {
            name.to_string()
        } else {
            format!("{name} {cmdline}")
        };
        for (category, set) in &self.sets {
            if set.is_match(&search_text) {
                return *category;
            }
        }
        ProcessCategory::Unknown
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary protection decision. A process is protected when any of:
/// - its pid is the monitoring process itself or one of its ancestors,
/// - its category carries the hard protection guarantee,
/// - it has live children (likely coordinating work),
/// - it holds open files under the user's home directory.
///
/// No weighting: protection overrides scoring entirely.
pub fn is_protected(
    pid: u32,
    category: ProcessCategory,
    children_count: u32,
    has_open_files_in_home: bool,
    shielded_pids: &HashSet<u32>,
) -> bool {
    shielded_pids.contains(&pid)
        || category.is_always_protected()
        || children_count > 0
        || has_open_files_in_home
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new()
    }

    #[test]
    fn protected_categories_match_first() {
        let c = classifier();
        assert_eq!(c.classify("kernel_task", ""), ProcessCategory::SystemCritical);
        assert_eq!(c.classify("cargo", "build --release"), ProcessCategory::Development);
        assert_eq!(c.classify("zsh", ""), ProcessCategory::Terminal);
    }

    #[test]
    fn killable_categories() {
        let c = classifier();
        assert_eq!(c.classify("Google Chrome Helper", ""), ProcessCategory::Browser);
        assert_eq!(c.classify("Slack Helper", ""), ProcessCategory::Communication);
        assert_eq!(c.classify("Dropbox", ""), ProcessCategory::CloudSync);
        assert_eq!(c.classify("VLC", ""), ProcessCategory::Media);
        assert_eq!(c.classify("mds_stores", ""), ProcessCategory::Background);
    }

    #[test]
    fn unmatched_is_unknown() {
        let c = classifier();
        assert_eq!(c.classify("some-random-tool", "--flag"), ProcessCategory::Unknown);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let c = classifier();
        assert_eq!(c.classify("DROPBOX", ""), ProcessCategory::CloudSync);
        assert_eq!(c.classify("firefox", ""), ProcessCategory::Browser);
    }

    #[test]
    fn cmdline_participates_in_matching() {
        let c = classifier();
        // Name alone says nothing; the command line reveals a dev tool.
        assert_eq!(c.classify("wrapper", "docker compose up"), ProcessCategory::Development);
    }

    #[test]
    fn anchored_patterns_do_not_overmatch() {
        let c = classifier();
        // "mds$" must not match "mds_stores" (a background process).
        assert_eq!(c.classify("mds_stores", ""), ProcessCategory::Background);
        assert_eq!(c.classify("mds", ""), ProcessCategory::SystemCritical);
    }

    #[test]
    fn protection_conditions_fire_individually() {
        let none: HashSet<u32> = HashSet::new();
        let shielded: HashSet<u32> = [42].into_iter().collect();

        // (a) own ancestry
        assert!(is_protected(42, ProcessCategory::Unknown, 0, false, &shielded));
        // (b) protected category
        assert!(is_protected(7, ProcessCategory::Development, 0, false, &none));
        assert!(is_protected(7, ProcessCategory::Terminal, 0, false, &none));
        assert!(is_protected(7, ProcessCategory::SystemCritical, 0, false, &none));
        // (c) children
        assert!(is_protected(7, ProcessCategory::Unknown, 1, false, &none));
        // (d) open files in home
        assert!(is_protected(7, ProcessCategory::Unknown, 0, true, &none));
        // none of the above
        assert!(!is_protected(7, ProcessCategory::Browser, 0, false, &none));
        assert!(!is_protected(7, ProcessCategory::Unknown, 0, false, &none));
    }
}
