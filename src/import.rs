use anyhow::{anyhow, bail, Context};
use calamine::{open_workbook_from_rs, DataType, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;

use crate::facade::Dashboard;
use crate::model::Role;
use crate::store::{AssignmentRow, BulkOutcome, BulkRow, EntityStore, RowPos, UserRow};

pub const USER_COLUMNS: [&str; 4] = ["nama", "username", "jenis_kelamin", "role"];
pub const ASSIGNMENT_COLUMNS: [&str; 2] = ["nipd", "kelas"];

/// First sheet of an upload: a lowercased header and the data rows, each with
/// its 1-based line number in the source file.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    header: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Sheet {
    fn from_records(records: Vec<(usize, Vec<String>)>) -> anyhow::Result<Self> {
        let mut it = records.into_iter();
        let Some((_, header)) = it.next() else {
            bail!("file has no header row");
        };
        let header = header
            .into_iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();
        let rows = it
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .collect();
        Ok(Self { header, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn columns<const N: usize>(&self, names: [&str; N]) -> anyhow::Result<[usize; N]> {
        let mut out = [0usize; N];
        let mut missing = Vec::new();
        for (slot, name) in out.iter_mut().zip(names) {
            match self.header.iter().position(|h| h == name) {
                Some(i) => *slot = i,
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            bail!("missing column(s): {}", missing.join(", "));
        }
        Ok(out)
    }
}

fn cell(cells: &[String], idx: usize) -> String {
    cells.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

pub fn parse_csv(text: &str) -> anyhow::Result<Sheet> {
    let records = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, parse_csv_record(line.trim_end_matches('\r'))))
        .collect();
    Sheet::from_records(records)
}

fn parse_xlsx(bytes: Vec<u8>) -> anyhow::Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| anyhow!("failed to open workbook: {e}"))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first = sheet_names
        .first()
        .ok_or_else(|| anyhow!("workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|e| anyhow!("failed to read sheet {first}: {e}"))?;
    let records = range
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let cells = row
                .iter()
                .map(|c| c.as_string().unwrap_or_else(|| c.to_string()))
                .collect();
            (i + 1, cells)
        })
        .collect();
    Sheet::from_records(records)
}

/// Reads `.xlsx` through calamine and anything else as CSV text.
pub fn read_sheet(path: &Path) -> anyhow::Result<Sheet> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        return parse_xlsx(bytes);
    }
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not UTF-8 text", path.to_string_lossy()))?;
    parse_csv(&text)
}

pub fn user_rows(sheet: &Sheet) -> anyhow::Result<Vec<BulkRow<UserRow>>> {
    let [nama, username, jenis_kelamin, role] = sheet.columns(USER_COLUMNS)?;
    Ok(sheet
        .rows
        .iter()
        .map(|(line, cells)| BulkRow {
            pos: RowPos::Line(*line),
            row: Ok(UserRow {
                nama: cell(cells, nama),
                username: cell(cells, username),
                jenis_kelamin: cell(cells, jenis_kelamin).to_lowercase(),
                role: cell(cells, role).to_lowercase(),
            }),
        })
        .collect())
}

fn resolve_assignment(
    store: &EntityStore,
    nipd: String,
    kelas: &str,
) -> Result<AssignmentRow, String> {
    if nipd.is_empty() || kelas.is_empty() {
        return Err("nipd and kelas are required".to_string());
    }
    if !store
        .user(&nipd)
        .is_some_and(|u| u.role == Role::Student)
    {
        return Err(format!("unknown student: {nipd}"));
    }
    let wanted = kelas.to_lowercase();
    let Some(class) = store
        .classes()
        .iter()
        .find(|k| k.kelas.trim().to_lowercase() == wanted)
    else {
        return Err(format!("unknown class: {kelas}"));
    };
    Ok(AssignmentRow {
        nipd,
        id_kelas: class.id,
    })
}

/// Resolves `nipd, kelas` rows against the store. A row naming an unknown
/// student or class keeps its source line and carries the reason.
pub fn assignment_rows(
    store: &EntityStore,
    sheet: &Sheet,
) -> anyhow::Result<Vec<BulkRow<AssignmentRow>>> {
    let [nipd_col, kelas_col] = sheet.columns(ASSIGNMENT_COLUMNS)?;
    Ok(sheet
        .rows
        .iter()
        .map(|(line, cells)| BulkRow {
            pos: RowPos::Line(*line),
            row: resolve_assignment(store, cell(cells, nipd_col), &cell(cells, kelas_col)),
        })
        .collect())
}

fn read_rows(path: &Path) -> anyhow::Result<Sheet> {
    let sheet = read_sheet(path)?;
    if sheet.is_empty() {
        bail!("{} has no data rows", path.to_string_lossy());
    }
    tracing::debug!(path = %path.to_string_lossy(), rows = sheet.len(), "sheet loaded");
    Ok(sheet)
}

pub fn import_users(d: &mut Dashboard, path: &Path) -> anyhow::Result<BulkOutcome> {
    let rows = user_rows(&read_rows(path)?)?;
    Ok(d.add_users_bulk(&rows))
}

pub fn import_class_assignments(d: &mut Dashboard, path: &Path) -> anyhow::Result<BulkOutcome> {
    let sheet = read_rows(path)?;
    let rows = assignment_rows(d.store(), &sheet)?;
    tracing::debug!(
        resolved = rows.iter().filter(|r| r.row.is_ok()).count(),
        total = rows.len(),
        "class assignments resolved"
    );
    Ok(d.assign_students_bulk(&rows))
}
