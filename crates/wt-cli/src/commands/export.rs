//! Implementation of the `warptrail export` command.
//!
//! Writes the recorded location history as Markdown, plain text or JSON,
//! either to a file or to stdout.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use wt_core::ExportFormat;
use wt_db::Database;

/// Output path meaning "write to stdout".
const STDOUT_PATH: &str = "-";

/// Runs the export command.
///
/// The format is taken from `format` when given, otherwise from the
/// extension of `output`. Unknown formats fail without writing anything.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    output: &Path,
    format: Option<&str>,
    title: &str,
) -> Result<()> {
    let to_stdout = output.as_os_str() == STDOUT_PATH;
    let format = match format {
        Some(selector) => selector.parse::<ExportFormat>()?,
        None if to_stdout => anyhow::bail!("--format is required when exporting to stdout"),
        None => ExportFormat::from_path(output)?,
    };

    let history = db.list_history().context("failed to read history")?;
    tracing::info!(
        entries = history.len(),
        format = format.extension(),
        output = %output.display(),
        "exporting location history"
    );
    let rendered = format.render(title, &history)?;

    if to_stdout {
        writer.write_all(rendered.as_bytes())?;
    } else {
        fs::write(output, rendered)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rusqlite::Connection;
    use wt_core::ExportError;

    const CHECKIN_FIXTURES: &str = r#"
        INSERT INTO "worlds" VALUES ('wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd', 'VRChat Home');
        INSERT INTO "worlds" VALUES ('wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e', NULL);
        INSERT INTO "worlds" VALUES ('wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399', 'Just Rain');
        INSERT INTO "worlds" VALUES ('wrld_26120cd6-6097-406e-8a48-a3657cb60511', 'Reflections 2');
        INSERT INTO "checkins" VALUES ('wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e', '2022-04-05T21:44:16-07:00', NULL);
        INSERT INTO "checkins" VALUES ('wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd', '2022-04-05T23:02:13-07:00', '2022-04-05T23:02:28-07:00');
        INSERT INTO "checkins" VALUES ('wrld_26120cd6-6097-406e-8a48-a3657cb60511', '2022-04-10T18:08:22-07:00', '2022-04-10T18:38:56-07:00');
        INSERT INTO "checkins" VALUES ('wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399', '2022-04-15T16:09:26-07:00', '2022-04-15T16:10:35-07:00');
        INSERT INTO "checkins" VALUES ('wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399', '2022-04-15T18:13:51-07:00', '2022-04-15T18:14:25-07:00');
        INSERT INTO "checkins" VALUES ('wrld_26120cd6-6097-406e-8a48-a3657cb60511', '2022-04-15T16:10:35-07:00', '2022-04-15T16:39:21-07:00');
    "#;

    fn fixture_db(dir: &Path) -> Database {
        let path = dir.join("WarpTrail.db");
        let db = Database::open(&path).unwrap();
        Connection::open(&path)
            .unwrap()
            .execute_batch(CHECKIN_FIXTURES)
            .unwrap();
        db
    }

    fn export_to_string(format: &str) -> String {
        let temp = tempfile::tempdir().unwrap();
        let db = fixture_db(temp.path());
        let mut output = Vec::new();
        run(&mut output, &db, Path::new("-"), Some(format), "WarpTrail").unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn exports_markdown() {
        assert_eq!(
            export_to_string("md"),
            "# WarpTrail Location History

- [wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e](https://vrch.at/wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e)  
  from 05/04/2022, 21:44 until (unknown)
- [VRChat Home](https://vrch.at/wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd)  
  from 05/04/2022, 23:02 until 05/04/2022, 23:02
- [Reflections 2](https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511)  
  from 10/04/2022, 18:08 until 10/04/2022, 18:38
- [Just Rain](https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399)  
  from 15/04/2022, 16:09 until 15/04/2022, 16:10
- [Just Rain](https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399)  
  from 15/04/2022, 18:13 until 15/04/2022, 18:14
- [Reflections 2](https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511)  
  from 15/04/2022, 16:10 until 15/04/2022, 16:39
"
        );
    }

    #[test]
    fn exports_text() {
        assert_eq!(
            export_to_string("txt"),
            "wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e (https://vrch.at/wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e), from 05/04/2022, 21:44 until (unknown)
VRChat Home (https://vrch.at/wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd), from 05/04/2022, 23:02 until 05/04/2022, 23:02
Reflections 2 (https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511), from 10/04/2022, 18:08 until 10/04/2022, 18:38
Just Rain (https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399), from 15/04/2022, 16:09 until 15/04/2022, 16:10
Just Rain (https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399), from 15/04/2022, 18:13 until 15/04/2022, 18:14
Reflections 2 (https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511), from 15/04/2022, 16:10 until 15/04/2022, 16:39
"
        );
    }

    #[test]
    fn exports_json() {
        assert_eq!(
            export_to_string("json"),
            r#"[{"world_name":null,"world_url":"https://vrch.at/wrld_47c2a8bd-1f76-4e2c-94bb-5ae3b43e762e","start_datetime":"2022-04-05T21:44:16-07:00","end_datetime":null},{"world_name":"VRChat Home","world_url":"https://vrch.at/wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd","start_datetime":"2022-04-05T23:02:13-07:00","end_datetime":"2022-04-05T23:02:28-07:00"},{"world_name":"Reflections 2","world_url":"https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511","start_datetime":"2022-04-10T18:08:22-07:00","end_datetime":"2022-04-10T18:38:56-07:00"},{"world_name":"Just Rain","world_url":"https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399","start_datetime":"2022-04-15T16:09:26-07:00","end_datetime":"2022-04-15T16:10:35-07:00"},{"world_name":"Just Rain","world_url":"https://vrch.at/wrld_56b348fc-b1cb-4242-8587-9eb8e01ef399","start_datetime":"2022-04-15T18:13:51-07:00","end_datetime":"2022-04-15T18:14:25-07:00"},{"world_name":"Reflections 2","world_url":"https://vrch.at/wrld_26120cd6-6097-406e-8a48-a3657cb60511","start_datetime":"2022-04-15T16:10:35-07:00","end_datetime":"2022-04-15T16:39:21-07:00"}]"#
        );
    }

    #[test]
    fn format_follows_file_extension() {
        let temp = tempfile::tempdir().unwrap();
        let db = fixture_db(temp.path());
        let output = temp.path().join("history.txt");

        run(&mut Vec::new(), &db, &output, None, "WarpTrail").unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 6);
        assert!(!written.starts_with('#'));
    }

    #[test]
    fn unsupported_format_fails_without_writing() {
        let temp = tempfile::tempdir().unwrap();
        let db = fixture_db(temp.path());
        let output = temp.path().join("history.csv");

        let err = run(&mut Vec::new(), &db, &output, None, "WarpTrail").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::UnsupportedFormat(s)) if s == "csv"
        ));
        assert!(!output.exists());
    }

    #[test]
    fn stdout_requires_explicit_format() {
        let temp = tempfile::tempdir().unwrap();
        let db = fixture_db(temp.path());
        let err = run(&mut Vec::new(), &db, Path::new("-"), None, "WarpTrail").unwrap_err();
        assert!(err.to_string().contains("--format"));
    }
}
