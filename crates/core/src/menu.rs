//! Menu state derivation
//!
//! This module implements the launcher's menu state machine: a pure, total
//! function from an [`InstallState`] snapshot to the ordered list of actions
//! the user may take next. It performs no I/O and never fails; contradictory
//! running flags (which a healthy launcher never produces) are resolved by a
//! fixed priority order rather than by erroring.
//!
//! Priority, first match wins:
//! 1. install running        -> single "Installing" progress indicator
//! 2. not installed          -> single "Install" action
//! 3. start running          -> "Open Web UI" + "Terminal" (or just "Terminal"
//!                              while no endpoint is published yet)
//! 4. update or quick-update -> single "Updating" progress indicator
//!    running                   (update wins the tie-break over quick-update)
//! 5. reset running          -> single "Resetting" progress indicator
//! 6. idle                   -> full action set with submenus
//!
//! Whenever the snapshot says installed, exactly one returned item is marked
//! default; there is never more than one default overall.

use crate::state::{InstallState, ScriptName};
use serde::{Deserialize, Serialize};

/// Icon hint for a menu item, mapped to glyphs by the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuIcon {
    /// Launch/play
    Rocket,
    /// Download/provision
    Download,
    /// Update/refresh
    Refresh,
    /// Destructive action
    Trash,
    /// Attach to process output
    Terminal,
    /// Open in browser
    Globe,
    /// Operation in progress
    Spinner,
    /// Acceleration option
    Bolt,
    /// Submenu marker
    Folder,
}

/// Invocation target for a lifecycle script, with query-style parameters
///
/// The desktop launcher treats the rendered string as an opaque URI; the
/// cache-buster parameter makes every evaluation produce a fresh token so the
/// launcher never reuses a stale invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTarget {
    /// Script to invoke as a new external process
    pub script: ScriptName,
    /// Ordered query parameters, cache-buster first
    pub params: Vec<(String, String)>,
}

impl ScriptTarget {
    fn new(script: ScriptName, token_ms: u64) -> Self {
        Self {
            script,
            params: vec![("cachebust".to_string(), token_ms.to_string())],
        }
    }

    fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Render the target as `script?key=value&...`
    pub fn uri(&self) -> String {
        let mut out = self.script.as_str().to_string();
        for (i, (key, value)) in self.params.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// What clicking a menu item does
///
/// The action tree is recursive: a submenu holds further items. Effects only
/// happen when the launcher later dispatches the entry; derivation itself is
/// side-effect free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MenuEntry {
    /// Launch a lifecycle script as a fresh external process
    Invoke { target: ScriptTarget },
    /// Navigate the browser to a URL
    Navigate { url: String },
    /// Attach a terminal view to a running script's output
    Attach { script: ScriptName },
    /// Non-actionable progress indicator pointing at a running script
    Progress { script: ScriptName },
    /// Nested action list
    Submenu { items: Vec<MenuItem> },
}

/// A single user-facing menu action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Display label
    pub label: String,
    /// Icon hint
    pub icon: MenuIcon,
    /// Whether this is the default (double-click / enter) action
    pub is_default: bool,
    /// Confirmation prompt shown before dispatch, for destructive actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
    /// The action itself
    pub entry: MenuEntry,
}

impl MenuItem {
    fn new(label: &str, icon: MenuIcon, entry: MenuEntry) -> Self {
        Self {
            label: label.to_string(),
            icon,
            is_default: false,
            confirm: None,
            entry,
        }
    }

    fn default_action(mut self) -> Self {
        self.is_default = true;
        self
    }

    fn confirmed(mut self, prompt: &str) -> Self {
        self.confirm = Some(prompt.to_string());
        self
    }
}

/// Append a cache-busting token to a published URL
fn cache_busted(url: &str, token_ms: u64) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, sep, token_ms)
}

/// Derive the menu for the given snapshot
///
/// Pure and total: no I/O, no panics, deterministic for a given snapshot and
/// clock token. `token_ms` is the caller's clock reading in milliseconds; it
/// feeds the cache-buster on every invocation target so two evaluations with
/// different clock values never produce identical target strings.
pub fn derive_menu(state: &InstallState, token_ms: u64) -> Vec<MenuItem> {
    // 1. An in-flight install dominates everything, including contradictory
    //    flags on other scripts.
    if state.is_running(ScriptName::Install) {
        return vec![MenuItem::new(
            "Installing",
            MenuIcon::Spinner,
            MenuEntry::Progress {
                script: ScriptName::Install,
            },
        )
        .default_action()];
    }

    // 2. Not installed: the only sensible action is to install.
    if !state.installed {
        return vec![MenuItem::new(
            "Install",
            MenuIcon::Download,
            MenuEntry::Invoke {
                target: ScriptTarget::new(ScriptName::Install, token_ms),
            },
        )
        .default_action()];
    }

    // 3a. Running app: open the web UI once an endpoint is published,
    //     otherwise offer the terminal view only.
    if state.is_running(ScriptName::Start) {
        return match &state.start_url {
            Some(url) => vec![
                MenuItem::new(
                    "Open Web UI",
                    MenuIcon::Globe,
                    MenuEntry::Navigate {
                        url: cache_busted(url, token_ms),
                    },
                )
                .default_action(),
                MenuItem::new(
                    "Terminal",
                    MenuIcon::Terminal,
                    MenuEntry::Attach {
                        script: ScriptName::Start,
                    },
                ),
            ],
            None => vec![MenuItem::new(
                "Terminal",
                MenuIcon::Terminal,
                MenuEntry::Attach {
                    script: ScriptName::Start,
                },
            )
            .default_action()],
        };
    }

    // 3b. Updating. Update takes precedence over quick-update when the flags
    //     contradict each other.
    if state.is_running(ScriptName::Update) || state.is_running(ScriptName::QuickUpdate) {
        let script = if state.is_running(ScriptName::Update) {
            ScriptName::Update
        } else {
            ScriptName::QuickUpdate
        };
        return vec![MenuItem::new(
            "Updating",
            MenuIcon::Spinner,
            MenuEntry::Progress { script },
        )
        .default_action()];
    }

    // 3c. Resetting.
    if state.is_running(ScriptName::Reset) {
        return vec![MenuItem::new(
            "Resetting",
            MenuIcon::Spinner,
            MenuEntry::Progress {
                script: ScriptName::Reset,
            },
        )
        .default_action()];
    }

    // 3d. Installed and idle: the full action set.
    vec![
        MenuItem::new(
            "Start",
            MenuIcon::Rocket,
            MenuEntry::Invoke {
                target: ScriptTarget::new(ScriptName::Start, token_ms),
            },
        )
        .default_action(),
        MenuItem::new(
            "Start with acceleration",
            MenuIcon::Folder,
            MenuEntry::Submenu {
                items: vec![
                    MenuItem::new(
                        "SageAttention2",
                        MenuIcon::Bolt,
                        MenuEntry::Invoke {
                            target: ScriptTarget::new(ScriptName::Start, token_ms)
                                .with_param("sage_attention", "true"),
                        },
                    ),
                    MenuItem::new(
                        "FlashAttention2",
                        MenuIcon::Bolt,
                        MenuEntry::Invoke {
                            target: ScriptTarget::new(ScriptName::Start, token_ms)
                                .with_param("flash_attention", "true"),
                        },
                    ),
                ],
            },
        ),
        MenuItem::new(
            "Update",
            MenuIcon::Folder,
            MenuEntry::Submenu {
                items: vec![
                    MenuItem::new(
                        "Quick Update",
                        MenuIcon::Refresh,
                        MenuEntry::Invoke {
                            target: ScriptTarget::new(ScriptName::QuickUpdate, token_ms),
                        },
                    ),
                    MenuItem::new(
                        "Full Update",
                        MenuIcon::Refresh,
                        MenuEntry::Invoke {
                            target: ScriptTarget::new(ScriptName::Update, token_ms),
                        },
                    ),
                ],
            },
        ),
        MenuItem::new(
            "Install",
            MenuIcon::Download,
            MenuEntry::Invoke {
                target: ScriptTarget::new(ScriptName::Install, token_ms),
            },
        ),
        MenuItem::new(
            "Reset",
            MenuIcon::Trash,
            MenuEntry::Invoke {
                target: ScriptTarget::new(ScriptName::Reset, token_ms),
            },
        )
        .confirmed("This removes the installed environment. Continue?"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InstallState;

    fn count_defaults(items: &[MenuItem]) -> usize {
        items.iter().filter(|i| i.is_default).count()
    }

    #[test]
    fn test_install_running_dominates_everything() {
        let mut state = InstallState::with_running(true, ScriptName::Install);
        // Contradictory flags must not change the outcome
        state.running.insert(ScriptName::Start, true);
        state.running.insert(ScriptName::Reset, true);
        state.start_url = Some("http://localhost:7860".to_string());

        let menu = derive_menu(&state, 1);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Installing");
        assert!(matches!(
            menu[0].entry,
            MenuEntry::Progress {
                script: ScriptName::Install
            }
        ));
    }

    #[test]
    fn test_fresh_state_offers_install_only() {
        let menu = derive_menu(&InstallState::idle(false), 1);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Install");
        assert!(menu[0].is_default);
        match &menu[0].entry {
            MenuEntry::Invoke { target } => assert_eq!(target.script, ScriptName::Install),
            other => panic!("expected invoke entry, got {:?}", other),
        }
    }

    #[test]
    fn test_installed_idle_full_action_set() {
        let menu = derive_menu(&InstallState::idle(true), 1);
        let labels: Vec<&str> = menu.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Start",
                "Start with acceleration",
                "Update",
                "Install",
                "Reset"
            ]
        );
        assert!(menu[0].is_default);
        assert_eq!(count_defaults(&menu), 1);

        // Reset is confirmation-gated
        assert!(menu[4].confirm.is_some());

        // Update submenu offers quick vs full
        match &menu[2].entry {
            MenuEntry::Submenu { items } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].label, "Quick Update");
                assert_eq!(items[1].label, "Full Update");
            }
            other => panic!("expected submenu, got {:?}", other),
        }

        // Acceleration submenu offers both kernels as separate launches
        match &menu[1].entry {
            MenuEntry::Submenu { items } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].label, "SageAttention2");
                assert_eq!(items[1].label, "FlashAttention2");
                match &items[0].entry {
                    MenuEntry::Invoke { target } => {
                        assert!(target.uri().contains("sage_attention=true"));
                    }
                    other => panic!("expected invoke entry, got {:?}", other),
                }
            }
            other => panic!("expected submenu, got {:?}", other),
        }
    }

    #[test]
    fn test_start_running_with_url() {
        let mut state = InstallState::with_running(true, ScriptName::Start);
        state.start_url = Some("http://localhost:7860".to_string());

        let menu = derive_menu(&state, 42);
        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].label, "Open Web UI");
        assert!(menu[0].is_default);
        match &menu[0].entry {
            MenuEntry::Navigate { url } => {
                assert!(url.contains("http://localhost:7860"));
                assert!(url.contains("t=42"));
            }
            other => panic!("expected navigate entry, got {:?}", other),
        }
        assert_eq!(menu[1].label, "Terminal");
        assert_eq!(count_defaults(&menu), 1);
    }

    #[test]
    fn test_start_running_without_url_terminal_only() {
        let state = InstallState::with_running(true, ScriptName::Start);
        let menu = derive_menu(&state, 1);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Terminal");
        assert!(menu[0].is_default);
    }

    #[test]
    fn test_cache_buster_differs_per_clock_value() {
        let mut state = InstallState::with_running(true, ScriptName::Start);
        state.start_url = Some("http://localhost:7860".to_string());

        let first = derive_menu(&state, 1000);
        let second = derive_menu(&state, 1001);
        let (MenuEntry::Navigate { url: a }, MenuEntry::Navigate { url: b }) =
            (&first[0].entry, &second[0].entry)
        else {
            panic!("expected navigate entries");
        };
        assert_ne!(a, b);

        // Same for the idle Start invocation target
        let first = derive_menu(&InstallState::idle(true), 1000);
        let second = derive_menu(&InstallState::idle(true), 1001);
        let (MenuEntry::Invoke { target: a }, MenuEntry::Invoke { target: b }) =
            (&first[0].entry, &second[0].entry)
        else {
            panic!("expected invoke entries");
        };
        assert_ne!(a.uri(), b.uri());
    }

    #[test]
    fn test_cache_buster_respects_existing_query() {
        assert_eq!(
            cache_busted("http://localhost:7860", 7),
            "http://localhost:7860?t=7"
        );
        assert_eq!(
            cache_busted("http://localhost:7860/?view=queue", 7),
            "http://localhost:7860/?view=queue&t=7"
        );
    }

    #[test]
    fn test_contradictory_update_flags_tie_break() {
        let mut state = InstallState::with_running(true, ScriptName::Update);
        state.running.insert(ScriptName::QuickUpdate, true);

        let menu = derive_menu(&state, 1);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Updating");
        assert!(matches!(
            menu[0].entry,
            MenuEntry::Progress {
                script: ScriptName::Update
            }
        ));
    }

    #[test]
    fn test_quick_update_alone_reports_quick_update() {
        let state = InstallState::with_running(true, ScriptName::QuickUpdate);
        let menu = derive_menu(&state, 1);
        assert_eq!(menu.len(), 1);
        assert!(matches!(
            menu[0].entry,
            MenuEntry::Progress {
                script: ScriptName::QuickUpdate
            }
        ));
    }

    #[test]
    fn test_start_dominates_update_and_reset() {
        let mut state = InstallState::with_running(true, ScriptName::Start);
        state.running.insert(ScriptName::Update, true);
        state.running.insert(ScriptName::Reset, true);

        let menu = derive_menu(&state, 1);
        assert_eq!(menu[0].label, "Terminal");
    }

    #[test]
    fn test_reset_running_ignores_other_flags() {
        let mut state = InstallState::with_running(true, ScriptName::Reset);
        state.running.insert(ScriptName::QuickUpdate, false);

        let menu = derive_menu(&state, 1);
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].label, "Resetting");
        assert!(menu[0].is_default);
    }

    #[test]
    fn test_exactly_one_default_across_installed_states() {
        let cases = vec![
            InstallState::idle(true),
            InstallState::with_running(true, ScriptName::Install),
            InstallState::with_running(true, ScriptName::Start),
            InstallState::with_running(true, ScriptName::Update),
            InstallState::with_running(true, ScriptName::QuickUpdate),
            InstallState::with_running(true, ScriptName::Reset),
        ];
        for state in cases {
            let menu = derive_menu(&state, 1);
            assert_eq!(
                count_defaults(&menu),
                1,
                "state {:?} produced {} defaults",
                state,
                count_defaults(&menu)
            );
        }
    }

    #[test]
    fn test_target_uri_rendering() {
        let target = ScriptTarget::new(ScriptName::Start, 99).with_param("sage_attention", "true");
        assert_eq!(target.uri(), "start?cachebust=99&sage_attention=true");
    }
}
