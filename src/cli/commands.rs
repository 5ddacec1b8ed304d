use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::OffsetDateTime;

use crate::app::{App, PopupState};
use crate::compose::RenderRow;
use crate::pins::{Placement, ReorderOutcome};
use crate::storage::{MigrationOutcome, StoreAdapter};

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Also print each target URI and spell out the pinned/recent flags
    #[arg(long)]
    pub all_flags: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PinArgs {
    /// Link identifier, e.g. `history`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
    /// Link identifier, e.g. `downloads`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    /// Pinned link to move
    pub source: String,
    /// Pinned link to move next to
    pub target: String,
    /// Place the source after the target instead of before it
    #[arg(long)]
    pub after: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn list_links(popup: &PopupState, args: &ListArgs, now: OffsetDateTime) -> Result<()> {
    print!("{}", format_rows(&popup.compose(now), args.all_flags));
    Ok(())
}

pub fn pin_link(popup: &mut PopupState, args: &PinArgs) -> Result<()> {
    ensure_known(popup, &args.id)?;
    match popup.toggle_pin(&args.id) {
        Some(true) => println!("Pinned {}", args.id),
        Some(false) => println!("Unpinned {}", args.id),
        None => {}
    }
    Ok(())
}

pub fn open_link(popup: &mut PopupState, args: &OpenArgs, now: OffsetDateTime) -> Result<()> {
    ensure_known(popup, &args.id)?;
    if let Some(link) = popup.open_link(&args.id, now) {
        println!("Opened {}", link.target_uri);
    }
    Ok(())
}

pub fn move_pin(popup: &mut PopupState, args: &MoveArgs) -> Result<()> {
    ensure_known(popup, &args.source)?;
    ensure_known(popup, &args.target)?;
    let placement = if args.after {
        Placement::After
    } else {
        Placement::Before
    };
    match popup.reorder(&args.source, &args.target, placement) {
        ReorderOutcome::Moved => {
            let order: Vec<String> = popup.pins().iter().map(ToString::to_string).collect();
            println!("Pinned order: {}", order.join(", "));
        }
        ReorderOutcome::Unchanged => println!("Pinned order unchanged"),
        ReorderOutcome::Rejected => {
            bail!(
                "both '{}' and '{}' must be pinned to reorder them",
                args.source,
                args.target
            )
        }
    }
    Ok(())
}

pub fn migrate(store: &StoreAdapter) -> Result<()> {
    let outcome = store
        .migrate_storage()
        .context("migrating pins to synced storage")?;
    match outcome {
        MigrationOutcome::Migrated { count } => println!("Migrated {count} pinned link(s)"),
        MigrationOutcome::LegacyEmpty => println!("Nothing to migrate"),
        MigrationOutcome::SyncPopulated => {
            println!("Synced pins already present; legacy copy left untouched")
        }
    }
    Ok(())
}

/// The core ignores unknown ids silently; on the command line a typo
/// deserves an error instead.
fn ensure_known(popup: &PopupState, id: &str) -> Result<()> {
    popup
        .catalog()
        .get(id)
        .map(|_| ())
        .with_context(|| format!("unknown link '{id}' (see `shortcut-deck list`)"))
}

fn format_rows(rows: &[RenderRow<'_>], all_flags: bool) -> String {
    if rows.is_empty() {
        return "No shortcuts available.\n".to_string();
    }
    let id_width = rows
        .iter()
        .map(|row| row.definition.id.as_str().len())
        .max()
        .unwrap_or(0);
    let label_width = rows
        .iter()
        .map(|row| row.definition.label.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for row in rows {
        let pin = if row.pinned { '★' } else { '☆' };
        let recent = if row.recent { '●' } else { '·' };
        let id = row.definition.id.as_str();
        let label = &row.definition.label;
        if all_flags {
            let _ = writeln!(
                &mut out,
                "{pin} {recent} {id:<id_width$}  {label:<label_width$}  {}  pinned={} recent={}",
                row.definition.target_uri, row.pinned, row.recent
            );
        } else {
            let _ = writeln!(&mut out, "{pin} {recent} {id:<id_width$}  {label}");
        }
    }
    out
}
