use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::activity::LogFilter;
use crate::calc::{self, DateRange};
use crate::facade::Dashboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Violations,
    Guidance,
    Summary,
    Unassigned,
    Logs,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Violations => "violations",
            Self::Guidance => "guidance",
            Self::Summary => "summary",
            Self::Unassigned => "unassigned",
            Self::Logs => "logs",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub rows: usize,
    pub bytes: usize,
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

struct CsvTable {
    out: String,
    rows: usize,
}

impl CsvTable {
    fn new(header: &[&str]) -> Self {
        let mut out = header.join(",");
        out.push('\n');
        Self { out, rows: 0 }
    }

    fn row(&mut self, cells: &[String]) {
        let line: Vec<String> = cells.iter().map(|c| csv_quote(c)).collect();
        self.out.push_str(&line.join(","));
        self.out.push('\n');
        self.rows += 1;
    }
}

fn class_name(d: &Dashboard, nipd: &str) -> String {
    d.store()
        .class_of(nipd)
        .map(|k| k.kelas.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn student_name(d: &Dashboard, nipd: &str) -> String {
    d.store()
        .user(nipd)
        .map(|u| u.nama.clone())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Renders one report as CSV text; returns the text and its data row count.
pub fn render_csv(d: &Dashboard, kind: ReportKind, range: DateRange) -> (String, usize) {
    let store = d.store();
    let table = match kind {
        ReportKind::Violations => {
            let mut t = CsvTable::new(&["No.", "Tanggal", "NIPD", "Nama Siswa", "Kelas", "Pelanggaran", "Jenis", "Poin"]);
            for (i, p) in store
                .violations()
                .iter()
                .filter(|p| range.contains(p.tanggal))
                .enumerate()
            {
                let s = store.sanction(p.id_sanksi);
                t.row(&[
                    (i + 1).to_string(),
                    p.tanggal.to_string(),
                    p.nipd.clone(),
                    student_name(d, &p.nipd),
                    class_name(d, &p.nipd),
                    s.map(|s| s.desk_kesalahan.clone()).unwrap_or_else(|| "N/A".into()),
                    s.map(|s| s.jenis_sanksi.as_str()).unwrap_or("N/A").to_string(),
                    s.map(|s| s.point_pelanggar).unwrap_or(0).to_string(),
                ]);
            }
            t
        }
        ReportKind::Guidance => {
            let mut t = CsvTable::new(&["No.", "Tanggal", "NIPD", "Nama Siswa", "Kelas", "Perbaikan", "Jenis", "Poin"]);
            for (i, b) in store
                .guidance()
                .iter()
                .filter(|b| range.contains(b.tanggal))
                .enumerate()
            {
                let r = store.remediation_entry(b.id_perbaikan);
                t.row(&[
                    (i + 1).to_string(),
                    b.tanggal.to_string(),
                    b.nipd.clone(),
                    student_name(d, &b.nipd),
                    class_name(d, &b.nipd),
                    r.map(|r| r.desk_perbaikan.clone()).unwrap_or_else(|| "N/A".into()),
                    r.map(|r| r.jenis_perbaikan.as_str()).unwrap_or("N/A").to_string(),
                    r.map(|r| r.point_perbaikan).unwrap_or(0).to_string(),
                ]);
            }
            t
        }
        ReportKind::Summary => {
            let mut t = CsvTable::new(&[
                "No.",
                "NIPD",
                "Nama Siswa",
                "Kelas",
                "Total Poin Pelanggaran",
                "Total Poin Perbaikan",
                "Poin Akhir",
                "Status",
            ]);
            let active = d
                .student_summaries(range)
                .into_iter()
                .filter(|s| s.totals.violation_points > 0 || s.totals.remediation_points > 0);
            for (i, s) in active.enumerate() {
                t.row(&[
                    (i + 1).to_string(),
                    s.nipd.clone(),
                    s.nama.clone(),
                    s.kelas.clone().unwrap_or_else(|| "-".into()),
                    s.totals.violation_points.to_string(),
                    s.totals.remediation_points.to_string(),
                    s.totals.net_score.to_string(),
                    s.tier.label().to_string(),
                ]);
            }
            t
        }
        ReportKind::Unassigned => {
            let mut t = CsvTable::new(&["No.", "NIPD", "Nama Siswa", "Jenis Kelamin"]);
            for (i, u) in calc::unassigned_students(store).into_iter().enumerate() {
                t.row(&[
                    (i + 1).to_string(),
                    u.username.clone(),
                    u.nama.clone(),
                    u.jenis_kelamin.as_str().to_string(),
                ]);
            }
            t
        }
        ReportKind::Logs => {
            let mut t = CsvTable::new(&["No.", "Waktu", "Username", "Aksi", "Entitas", "Detail"]);
            let filter = LogFilter {
                start: range.start,
                end: range.end,
                ..Default::default()
            };
            for (i, e) in d.list_logs(&filter).iter().enumerate() {
                t.row(&[
                    (i + 1).to_string(),
                    e.timestamp.to_rfc3339(),
                    e.username.clone(),
                    e.action.as_str().to_string(),
                    e.entity.as_str().to_string(),
                    e.details.clone(),
                ]);
            }
            t
        }
    };
    (table.out, table.rows)
}

pub fn write_text_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(())
}

pub fn export_report(
    d: &Dashboard,
    kind: ReportKind,
    range: DateRange,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let (text, rows) = render_csv(d, kind, range);
    write_text_file(out_path, &text)?;
    Ok(ExportSummary {
        rows,
        bytes: text.len(),
    })
}
