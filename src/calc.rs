use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::model::{
    JenisPerbaikan, JenisSanksi, PointThresholds, Role, Tingkat, User,
};
use crate::store::EntityStore;

/// Scores at or below this are always `Normal`, whatever the thresholds say.
pub const NORMAL_CEILING: i64 = 29;
pub const TOP_OFFENDER_LIMIT: usize = 5;
const TREND_DAYS: i64 = 7;

/// Inclusive date filter; a missing bound is unrestricted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start.map_or(true, |s| d >= s) && self.end.map_or(true, |e| d <= e)
    }
}

/// `YYYY-MM` to the first and last day of that month.
pub fn month_range(month: &str) -> CoreResult<DateRange> {
    let bad = || CoreError::validation(format!("month must be YYYY-MM: {month}"));
    let (y, m) = month.trim().split_once('-').ok_or_else(bad)?;
    let year: i32 = y.parse().map_err(|_| bad())?;
    let mon: u32 = m.parse().map_err(|_| bad())?;
    let first = NaiveDate::from_ymd_opt(year, mon, 1).ok_or_else(bad)?;
    let next = if mon == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, mon + 1, 1)
    }
    .ok_or_else(bad)?;
    Ok(DateRange {
        start: Some(first),
        end: next.pred_opt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Normal,
    PerluPengawasan,
    PerlakuanKhusus,
    KondisiKritis,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::PerluPengawasan => "Perlu Pengawasan",
            Self::PerlakuanKhusus => "Perlakuan Khusus",
            Self::KondisiKritis => "Kondisi Kritis",
        }
    }
}

pub fn classify(net_score: i64, thresholds: PointThresholds) -> Tier {
    if net_score <= NORMAL_CEILING {
        Tier::Normal
    } else if net_score <= thresholds.aman {
        Tier::PerluPengawasan
    } else if net_score <= thresholds.perhatian {
        Tier::PerlakuanKhusus
    } else {
        Tier::KondisiKritis
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTotals {
    pub violation_points: i64,
    pub remediation_points: i64,
    pub net_score: i64,
}

impl PointTotals {
    fn new(violation_points: i64, remediation_points: i64) -> Self {
        Self {
            violation_points,
            remediation_points,
            net_score: (violation_points - remediation_points).max(0),
        }
    }
}

pub fn violation_points(store: &EntityStore, nipd: &str, range: DateRange) -> i64 {
    store
        .violations()
        .iter()
        .filter(|p| p.nipd == nipd && range.contains(p.tanggal))
        .filter_map(|p| store.sanction(p.id_sanksi))
        .map(|s| s.point_pelanggar)
        .sum()
}

pub fn remediation_points(store: &EntityStore, nipd: &str, range: DateRange) -> i64 {
    store
        .guidance()
        .iter()
        .filter(|b| b.nipd == nipd && range.contains(b.tanggal))
        .filter_map(|b| store.remediation_entry(b.id_perbaikan))
        .map(|i| i.point_perbaikan)
        .sum()
}

pub fn student_totals(store: &EntityStore, nipd: &str, range: DateRange) -> PointTotals {
    PointTotals::new(
        violation_points(store, nipd, range),
        remediation_points(store, nipd, range),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub nipd: String,
    pub nama: String,
    pub id_kelas: Option<i64>,
    pub kelas: Option<String>,
    #[serde(flatten)]
    pub totals: PointTotals,
    pub tier: Tier,
}

/// One row per student-role user, in user order.
pub fn student_summaries(
    store: &EntityStore,
    thresholds: PointThresholds,
    range: DateRange,
) -> Vec<StudentSummary> {
    store
        .users()
        .iter()
        .filter(|u| u.role == Role::Student)
        .map(|u| {
            let totals = student_totals(store, &u.username, range);
            let class = store.class_of(&u.username);
            StudentSummary {
                nipd: u.username.clone(),
                nama: u.nama.clone(),
                id_kelas: class.map(|k| k.id),
                kelas: class.map(|k| k.kelas.clone()),
                totals,
                tier: classify(totals.net_score, thresholds),
            }
        })
        .collect()
}

pub fn unassigned_students(store: &EntityStore) -> Vec<&User> {
    store
        .users()
        .iter()
        .filter(|u| u.role == Role::Student)
        .filter(|u| {
            store
                .assignment(&u.username)
                .and_then(|s| s.id_kelas)
                .is_none()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationLine {
    pub id: i64,
    pub tanggal: NaiveDate,
    pub id_sanksi: i64,
    pub desk_kesalahan: String,
    pub jenis_sanksi: JenisSanksi,
    pub point_pelanggar: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceLine {
    pub id: i64,
    pub tanggal: NaiveDate,
    pub id_perbaikan: i64,
    pub desk_perbaikan: String,
    pub jenis_perbaikan: JenisPerbaikan,
    pub point_perbaikan: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub nipd: String,
    pub nama: String,
    pub kelas: Option<String>,
    pub violations: Vec<ViolationLine>,
    pub guidance: Vec<GuidanceLine>,
    #[serde(flatten)]
    pub totals: PointTotals,
    pub tier: Tier,
}

pub fn student_report(
    store: &EntityStore,
    thresholds: PointThresholds,
    nipd: &str,
    range: DateRange,
) -> CoreResult<StudentReport> {
    let student = store
        .user(nipd)
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| CoreError::not_found("student", nipd))?;

    let mut violations: Vec<ViolationLine> = store
        .violations()
        .iter()
        .filter(|p| p.nipd == nipd && range.contains(p.tanggal))
        .filter_map(|p| {
            store.sanction(p.id_sanksi).map(|s| ViolationLine {
                id: p.id,
                tanggal: p.tanggal,
                id_sanksi: s.id,
                desk_kesalahan: s.desk_kesalahan.clone(),
                jenis_sanksi: s.jenis_sanksi,
                point_pelanggar: s.point_pelanggar,
            })
        })
        .collect();
    violations.sort_by(|a, b| b.tanggal.cmp(&a.tanggal));

    let mut guidance: Vec<GuidanceLine> = store
        .guidance()
        .iter()
        .filter(|b| b.nipd == nipd && range.contains(b.tanggal))
        .filter_map(|b| {
            store.remediation_entry(b.id_perbaikan).map(|i| GuidanceLine {
                id: b.id,
                tanggal: b.tanggal,
                id_perbaikan: i.id,
                desk_perbaikan: i.desk_perbaikan.clone(),
                jenis_perbaikan: i.jenis_perbaikan,
                point_perbaikan: i.point_perbaikan,
            })
        })
        .collect();
    guidance.sort_by(|a, b| b.tanggal.cmp(&a.tanggal));

    let totals = PointTotals::new(
        violations.iter().map(|v| v.point_pelanggar).sum(),
        guidance.iter().map(|g| g.point_perbaikan).sum(),
    );
    Ok(StudentReport {
        nipd: student.username.clone(),
        nama: student.nama.clone(),
        kelas: store.class_of(nipd).map(|k| k.kelas.clone()),
        violations,
        guidance,
        totals,
        tier: classify(totals.net_score, thresholds),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCount {
    pub id: i64,
    pub kelas: String,
    pub tingkat: Tingkat,
    pub count: usize,
}

/// Violations per class for every class that currently holds at least one
/// student, ordered X, XI, XII and then by class name.
pub fn class_violation_counts(store: &EntityStore, range: DateRange) -> Vec<ClassCount> {
    let mut per_class: HashMap<i64, usize> = HashMap::new();
    for p in store.violations().iter().filter(|p| range.contains(p.tanggal)) {
        if let Some(id) = store.assignment(&p.nipd).and_then(|s| s.id_kelas) {
            *per_class.entry(id).or_insert(0) += 1;
        }
    }

    let mut seen: HashSet<i64> = HashSet::new();
    let mut out: Vec<ClassCount> = store
        .assignments()
        .iter()
        .filter_map(|s| s.id_kelas)
        .filter(|id| seen.insert(*id))
        .filter_map(|id| store.class(id))
        .map(|k| ClassCount {
            id: k.id,
            kelas: k.kelas.clone(),
            tingkat: k.tingkat,
            count: per_class.get(&k.id).copied().unwrap_or(0),
        })
        .collect();
    out.sort_by(|a, b| {
        a.tingkat
            .cmp(&b.tingkat)
            .then_with(|| a.kelas.to_lowercase().cmp(&b.kelas.to_lowercase()))
            .then_with(|| a.kelas.cmp(&b.kelas))
    });
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offender {
    pub nipd: String,
    pub nama: String,
    pub kelas: Option<String>,
    #[serde(flatten)]
    pub totals: PointTotals,
}

/// Students with activity in the period, highest net score first. Ties keep
/// first-seen order: violations in record order, then guidance.
pub fn top_offenders(store: &EntityStore, range: DateRange, limit: usize) -> Vec<Offender> {
    let mut order: Vec<&str> = Vec::new();
    let mut points: HashMap<&str, (i64, i64)> = HashMap::new();

    for p in store.violations().iter().filter(|p| range.contains(p.tanggal)) {
        if let Some(s) = store.sanction(p.id_sanksi) {
            let slot = points.entry(p.nipd.as_str()).or_insert_with(|| {
                order.push(p.nipd.as_str());
                (0, 0)
            });
            slot.0 += s.point_pelanggar;
        }
    }
    for b in store.guidance().iter().filter(|b| range.contains(b.tanggal)) {
        if let Some(i) = store.remediation_entry(b.id_perbaikan) {
            let slot = points.entry(b.nipd.as_str()).or_insert_with(|| {
                order.push(b.nipd.as_str());
                (0, 0)
            });
            slot.1 += i.point_perbaikan;
        }
    }

    let mut ranked: Vec<Offender> = order
        .into_iter()
        .filter_map(|nipd| {
            let user = store.user(nipd).filter(|u| u.role == Role::Student)?;
            let (v, r) = points.get(nipd).copied().unwrap_or_default();
            Some(Offender {
                nipd: user.username.clone(),
                nama: user.nama.clone(),
                kelas: store.class_of(nipd).map(|k| k.kelas.clone()),
                totals: PointTotals::new(v, r),
            })
        })
        .collect();
    // stable
    ranked.sort_by(|a, b| b.totals.net_score.cmp(&a.totals.net_score));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Violations,
    Guidance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostCommon {
    pub id: i64,
    pub description: String,
    pub count: usize,
    pub student_count: usize,
}

/// The catalog entry referenced most often in the period. The first entry to
/// reach the top count wins a tie. `None` when the period is empty or the
/// winning entry no longer exists.
pub fn most_common(store: &EntityStore, kind: RecordKind, range: DateRange) -> Option<MostCommon> {
    let refs: Vec<(i64, &str)> = match kind {
        RecordKind::Violations => store
            .violations()
            .iter()
            .filter(|p| range.contains(p.tanggal))
            .map(|p| (p.id_sanksi, p.nipd.as_str()))
            .collect(),
        RecordKind::Guidance => store
            .guidance()
            .iter()
            .filter(|b| range.contains(b.tanggal))
            .map(|b| (b.id_perbaikan, b.nipd.as_str()))
            .collect(),
    };

    let mut counts: Vec<(i64, usize)> = Vec::new();
    for (id, _) in &refs {
        match counts.iter_mut().find(|(k, _)| k == id) {
            Some((_, n)) => *n += 1,
            None => counts.push((*id, 1)),
        }
    }
    let (winner, count) = counts
        .into_iter()
        .reduce(|a, b| if b.1 > a.1 { b } else { a })?;

    let description = match kind {
        RecordKind::Violations => store.sanction(winner)?.desk_kesalahan.clone(),
        RecordKind::Guidance => store.remediation_entry(winner)?.desk_perbaikan.clone(),
    };
    let students: HashSet<&str> = refs
        .iter()
        .filter(|(id, _)| *id == winner)
        .map(|(_, nipd)| *nipd)
        .collect();
    Some(MostCommon {
        id: winner,
        description,
        count,
        student_count: students.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TingkatCount {
    pub tingkat: Tingkat,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityBreakdown {
    pub ringan: usize,
    pub sedang: usize,
    pub berat: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyBreakdown {
    pub mudah: usize,
    pub cukup: usize,
    pub sulit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub violations: usize,
    pub guidance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub today: NaiveDate,
    pub month: DateRange,
    pub students_per_tingkat: Vec<TingkatCount>,
    pub total_violations: usize,
    pub violations_today: usize,
    pub guidance_today: usize,
    pub severity_today: SeverityBreakdown,
    pub difficulty_today: DifficultyBreakdown,
    pub trend: Vec<TrendPoint>,
    pub class_counts: Vec<ClassCount>,
    pub top_offenders: Vec<Offender>,
    pub most_common_violation: Option<MostCommon>,
    pub most_common_guidance: Option<MostCommon>,
}

pub fn dashboard_overview(store: &EntityStore, today: NaiveDate, month: DateRange) -> DashboardOverview {
    let students_per_tingkat = Tingkat::ALL
        .iter()
        .map(|t| TingkatCount {
            tingkat: *t,
            count: store
                .assignments()
                .iter()
                .filter_map(|s| s.id_kelas.and_then(|id| store.class(id)))
                .filter(|k| k.tingkat == *t)
                .count(),
        })
        .collect();

    let mut severity_today = SeverityBreakdown::default();
    let mut violations_today = 0;
    for p in store.violations().iter().filter(|p| p.tanggal == today) {
        violations_today += 1;
        match store.sanction(p.id_sanksi).map(|s| s.jenis_sanksi) {
            Some(JenisSanksi::Ringan) => severity_today.ringan += 1,
            Some(JenisSanksi::Sedang) => severity_today.sedang += 1,
            Some(JenisSanksi::Berat) => severity_today.berat += 1,
            None => {}
        }
    }

    let mut difficulty_today = DifficultyBreakdown::default();
    let mut guidance_today = 0;
    for b in store.guidance().iter().filter(|b| b.tanggal == today) {
        guidance_today += 1;
        match store.remediation_entry(b.id_perbaikan).map(|i| i.jenis_perbaikan) {
            Some(JenisPerbaikan::Mudah) => difficulty_today.mudah += 1,
            Some(JenisPerbaikan::Cukup) => difficulty_today.cukup += 1,
            Some(JenisPerbaikan::Sulit) => difficulty_today.sulit += 1,
            None => {}
        }
    }

    let trend = (0..TREND_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .map(|date| TrendPoint {
            date,
            violations: store.violations().iter().filter(|p| p.tanggal == date).count(),
            guidance: store.guidance().iter().filter(|b| b.tanggal == date).count(),
        })
        .collect();

    DashboardOverview {
        today,
        month,
        students_per_tingkat,
        total_violations: store.violations().len(),
        violations_today,
        guidance_today,
        severity_today,
        difficulty_today,
        trend,
        class_counts: class_violation_counts(store, month),
        top_offenders: top_offenders(store, month, TOP_OFFENDER_LIMIT),
        most_common_violation: most_common(store, RecordKind::Violations, month),
        most_common_guidance: most_common(store, RecordKind::Guidance, month),
    }
}

/// `YYYY-MM` of a date, as the month picker shows it.
pub fn month_key(d: NaiveDate) -> String {
    format!("{:04}-{:02}", d.year(), d.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Gender, NewBimbingan, NewIntrospeksi, NewKelas, NewPelanggaran, NewSanksi, Siswa,
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("date")
    }

    fn student(s: &mut EntityStore, nipd: &str, nama: &str) {
        s.insert_user(User {
            username: nipd.into(),
            nama: nama.into(),
            jenis_kelamin: Gender::Female,
            role: Role::Student,
            photo: None,
        })
        .expect("student");
    }

    fn sanction(s: &mut EntityStore, desk: &str, points: i64) -> i64 {
        s.insert_sanction(NewSanksi {
            desk_kesalahan: desk.into(),
            jenis_sanksi: JenisSanksi::Sedang,
            point_pelanggar: points,
        })
        .expect("sanction")
        .id
    }

    fn remediation(s: &mut EntityStore, desk: &str, points: i64) -> i64 {
        s.insert_remediation(NewIntrospeksi {
            desk_perbaikan: desk.into(),
            jenis_perbaikan: JenisPerbaikan::Cukup,
            point_perbaikan: points,
        })
        .expect("remediation")
        .id
    }

    fn violate(s: &mut EntityStore, nipd: &str, id_sanksi: i64, tanggal: NaiveDate) {
        s.insert_violation(NewPelanggaran {
            nipd: nipd.into(),
            id_sanksi,
            tanggal,
        })
        .expect("violation");
    }

    fn guide(s: &mut EntityStore, nipd: &str, id_perbaikan: i64, tanggal: NaiveDate) {
        s.insert_guidance(NewBimbingan {
            nipd: nipd.into(),
            id_perbaikan,
            tanggal,
        })
        .expect("guidance");
    }

    #[test]
    fn tier_boundaries_with_default_thresholds() {
        let t = PointThresholds::default();
        assert_eq!(classify(0, t), Tier::Normal);
        assert_eq!(classify(29, t), Tier::Normal);
        // aman (10) sits below the fixed ceiling, so the monitoring tier is skipped
        assert_eq!(classify(30, t), Tier::PerlakuanKhusus);
        assert_eq!(classify(40, t), Tier::PerlakuanKhusus);
        assert_eq!(classify(41, t), Tier::KondisiKritis);

        let wide = PointThresholds {
            aman: 50,
            perhatian: 80,
        };
        assert_eq!(classify(30, wide), Tier::PerluPengawasan);
        assert_eq!(classify(50, wide), Tier::PerluPengawasan);
        assert_eq!(classify(51, wide), Tier::PerlakuanKhusus);
        assert_eq!(classify(81, wide), Tier::KondisiKritis);
    }

    #[test]
    fn scoring_walkthrough_follows_records() {
        let mut s = EntityStore::new();
        student(&mut s, "S", "Siswa Satu");
        let ten = sanction(&mut s, "Terlambat", 10);
        let t = PointThresholds::default();
        let all = DateRange::all();

        assert_eq!(student_totals(&s, "S", all).net_score, 0);

        violate(&mut s, "S", ten, d(2024, 5, 1));
        let totals = student_totals(&s, "S", all);
        assert_eq!(totals.violation_points, 10);
        assert_eq!(classify(totals.net_score, t), Tier::Normal);

        let five = sanction(&mut s, "Seragam", 5);
        violate(&mut s, "S", ten, d(2024, 5, 2));
        violate(&mut s, "S", five, d(2024, 5, 3));
        violate(&mut s, "S", ten, d(2024, 5, 4));
        // 10 + 10 + 5 + 10 = 35
        let totals = student_totals(&s, "S", all);
        assert_eq!(totals.net_score, 35);
        assert_eq!(classify(totals.net_score, t), Tier::PerlakuanKhusus);

        let forty = remediation(&mut s, "Kerja bakti", 40);
        guide(&mut s, "S", forty, d(2024, 5, 5));
        let totals = student_totals(&s, "S", all);
        assert_eq!(totals.remediation_points, 40);
        assert_eq!(totals.net_score, 0);

        s.delete_sanction(ten).expect("delete");
        assert_eq!(violation_points(&s, "S", all), 5);
    }

    #[test]
    fn date_range_is_inclusive_and_optional() {
        let mut s = EntityStore::new();
        student(&mut s, "S", "Siswa");
        let id = sanction(&mut s, "x", 3);
        violate(&mut s, "S", id, d(2024, 1, 31));
        violate(&mut s, "S", id, d(2024, 2, 1));
        violate(&mut s, "S", id, d(2024, 2, 29));

        let feb = month_range("2024-02").expect("month");
        assert_eq!(feb.end, Some(d(2024, 2, 29)));
        assert_eq!(violation_points(&s, "S", feb), 6);

        let open_start = DateRange {
            start: None,
            end: Some(d(2024, 2, 1)),
        };
        assert_eq!(violation_points(&s, "S", open_start), 6);
        assert_eq!(
            violation_points(&s, "S", DateRange::all()),
            violation_points(&s, "S", DateRange { start: None, end: None })
        );
        assert!(month_range("2024-13").is_err());
        assert!(month_range("2024").is_err());
        assert_eq!(month_range("2023-12").expect("dec").end, Some(d(2023, 12, 31)));
    }

    #[test]
    fn top_offenders_stable_on_ties_and_students_only() {
        let mut s = EntityStore::new();
        for (n, name) in [("A", "Ani"), ("B", "Beni"), ("C", "Caca"), ("D", "Dodi")] {
            student(&mut s, n, name);
        }
        let v = sanction(&mut s, "x", 10);
        let r = remediation(&mut s, "y", 4);
        let day = d(2024, 6, 10);
        violate(&mut s, "B", v, day);
        violate(&mut s, "A", v, day);
        violate(&mut s, "C", v, day);
        violate(&mut s, "C", v, day);
        guide(&mut s, "D", r, day);
        guide(&mut s, "C", r, day);

        let ranked = top_offenders(&s, month_range("2024-06").expect("m"), 5);
        let order: Vec<&str> = ranked.iter().map(|o| o.nipd.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "A", "D"]);
        assert_eq!(ranked[0].totals.net_score, 16);
        assert_eq!(ranked[3].totals.net_score, 0);

        let none = top_offenders(&s, month_range("2024-07").expect("m"), 5);
        assert!(none.is_empty());
    }

    #[test]
    fn most_common_first_maximum_wins() {
        let mut s = EntityStore::new();
        student(&mut s, "A", "Ani");
        student(&mut s, "B", "Beni");
        let late = sanction(&mut s, "Terlambat", 5);
        let phone = sanction(&mut s, "Main HP", 5);
        let day = d(2024, 6, 1);
        violate(&mut s, "A", phone, day);
        violate(&mut s, "A", late, day);
        violate(&mut s, "B", late, day);
        violate(&mut s, "A", phone, day);

        let top = most_common(&s, RecordKind::Violations, DateRange::all()).expect("winner");
        assert_eq!(top.id, phone);
        assert_eq!(top.count, 2);
        assert_eq!(top.student_count, 1);

        assert!(most_common(&s, RecordKind::Guidance, DateRange::all()).is_none());
    }

    #[test]
    fn class_counts_sorted_by_grade_then_name() {
        let mut s = EntityStore::new();
        for n in ["A", "B", "C", "D"] {
            student(&mut s, n, n);
        }
        let xii = s
            .insert_class(NewKelas {
                kelas: "XII-IPA".into(),
                tingkat: Tingkat::XII,
                id_guru: None,
            })
            .expect("c")
            .id;
        let x_b = s
            .insert_class(NewKelas {
                kelas: "X-B".into(),
                tingkat: Tingkat::X,
                id_guru: None,
            })
            .expect("c")
            .id;
        let x_a = s
            .insert_class(NewKelas {
                kelas: "X-A".into(),
                tingkat: Tingkat::X,
                id_guru: None,
            })
            .expect("c")
            .id;
        s.insert_class(NewKelas {
            kelas: "XI-Empty".into(),
            tingkat: Tingkat::XI,
            id_guru: None,
        })
        .expect("c");
        for (n, k) in [("A", xii), ("B", x_b), ("C", x_a), ("D", x_a)] {
            s.insert_assignment(Siswa {
                nipd: n.into(),
                id_kelas: Some(k),
            })
            .expect("assign");
        }
        let v = sanction(&mut s, "x", 1);
        violate(&mut s, "C", v, d(2024, 1, 1));
        violate(&mut s, "D", v, d(2024, 1, 2));
        violate(&mut s, "A", v, d(2024, 2, 2));

        let counts = class_violation_counts(&s, month_range("2024-01").expect("m"));
        let names: Vec<(&str, usize)> = counts.iter().map(|c| (c.kelas.as_str(), c.count)).collect();
        assert_eq!(names, vec![("X-A", 2), ("X-B", 0), ("XII-IPA", 0)]);
    }

    #[test]
    fn dashboard_counts_today_and_trend() {
        let mut s = EntityStore::new();
        student(&mut s, "A", "Ani");
        let k = s
            .insert_class(NewKelas {
                kelas: "XI-1".into(),
                tingkat: Tingkat::XI,
                id_guru: None,
            })
            .expect("class")
            .id;
        s.insert_assignment(Siswa {
            nipd: "A".into(),
            id_kelas: Some(k),
        })
        .expect("assign");
        let v = sanction(&mut s, "x", 7);
        let r = remediation(&mut s, "y", 2);
        let today = d(2024, 3, 10);
        violate(&mut s, "A", v, today);
        violate(&mut s, "A", v, d(2024, 3, 8));
        violate(&mut s, "A", v, d(2024, 3, 1));
        guide(&mut s, "A", r, today);

        let o = dashboard_overview(&s, today, month_range(&month_key(today)).expect("m"));
        assert_eq!(o.total_violations, 3);
        assert_eq!(o.violations_today, 1);
        assert_eq!(o.guidance_today, 1);
        assert_eq!(o.severity_today.sedang, 1);
        assert_eq!(o.difficulty_today.cukup, 1);
        assert_eq!(o.students_per_tingkat[1].count, 1);
        assert_eq!(o.trend.len(), 7);
        assert_eq!(o.trend[0].date, d(2024, 3, 4));
        assert_eq!(o.trend[4].violations, 1);
        assert_eq!(o.trend[6].violations, 1);
        assert_eq!(o.top_offenders[0].totals.net_score, 19);
        assert_eq!(o.class_counts[0].count, 3);
    }

    #[test]
    fn report_lists_newest_first_and_unassigned_is_reported() {
        let mut s = EntityStore::new();
        student(&mut s, "A", "Ani");
        student(&mut s, "B", "Beni");
        let v = sanction(&mut s, "x", 7);
        violate(&mut s, "A", v, d(2024, 3, 1));
        violate(&mut s, "A", v, d(2024, 3, 9));

        let rep = student_report(&s, PointThresholds::default(), "A", DateRange::all()).expect("report");
        assert_eq!(rep.violations[0].tanggal, d(2024, 3, 9));
        assert_eq!(rep.totals.net_score, 14);
        assert_eq!(rep.tier, Tier::Normal);
        assert!(student_report(&s, PointThresholds::default(), "Z", DateRange::all()).is_err());

        let un: Vec<&str> = unassigned_students(&s).iter().map(|u| u.username.as_str()).collect();
        assert_eq!(un, vec!["A", "B"]);
    }
}
