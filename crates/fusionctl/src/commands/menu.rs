//! Menu command implementation
//!
//! Gathers a fresh state snapshot, derives the action list, and prints it.
//! JSON output is a pure serialization of the derived items for the desktop
//! launcher to consume; text output is a readable tree for humans.

use super::CommandContext;
use crate::cli::OutputFormat;
use anyhow::Result;
use fusionctl_core::menu::{derive_menu, MenuEntry, MenuItem};
use fusionctl_core::progress::current_timestamp_ms;
use fusionctl_core::state::InstallState;
use tracing::{debug, instrument};

/// Execute the menu command
#[instrument(skip(context))]
pub fn execute_menu(output: OutputFormat, context: &CommandContext) -> Result<()> {
    let config = context.load_config()?;
    let run_dir = context.run_dir()?;
    let state = InstallState::gather(&config.env_marker(&context.workspace), &run_dir);
    debug!(installed = state.installed, "Deriving menu");

    let items = derive_menu(&state, current_timestamp_ms());
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in &items {
                print_item(item, 0);
            }
        }
    }
    Ok(())
}

fn print_item(item: &MenuItem, indent: usize) {
    let pad = "  ".repeat(indent);
    let marker = if item.is_default { "*" } else { "-" };
    let detail = match &item.entry {
        MenuEntry::Invoke { target } => format!(" ({})", target.uri()),
        MenuEntry::Navigate { url } => format!(" ({})", url),
        MenuEntry::Attach { script } => format!(" (attach {})", script),
        MenuEntry::Progress { script } => format!(" ({} in progress)", script),
        MenuEntry::Submenu { .. } => String::new(),
    };
    let confirm = item
        .confirm
        .as_deref()
        .map(|_| " [confirm]")
        .unwrap_or_default();
    println!("{}{} {}{}{}", pad, marker, item.label, detail, confirm);

    if let MenuEntry::Submenu { items } = &item.entry {
        for sub in items {
            print_item(sub, indent + 1);
        }
    }
}
