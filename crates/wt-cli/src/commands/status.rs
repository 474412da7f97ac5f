//! Status command for showing what the database holds.

use std::io::Write;

use anyhow::{Context, Result};

use wt_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let counts = db.counts()?;

    writeln!(writer, "WarpTrail status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Worlds:    {}", counts.places)?;
    writeln!(writer, "Check-ins: {}", counts.checkins)?;
    writeln!(writer, "Visitors:  {}", counts.visitors)?;

    let open = db.list_open_checkins()?;
    if open.is_empty() {
        writeln!(writer, "No open check-ins.")?;
        return Ok(());
    }

    writeln!(writer, "Open check-ins:")?;
    for entry in open {
        let label = entry.place_name.as_deref().unwrap_or(&entry.place_id);
        let since = entry.start.as_deref().unwrap_or("(unknown)");
        let present = db
            .list_visitors(&entry.place_id)?
            .into_iter()
            .filter(|visitor| visitor.end.is_none())
            .count();
        writeln!(writer, "- {label} since {since} ({present} present)")?;
    }

    Ok(())
}
