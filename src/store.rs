use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::model::{
    Bimbingan, Gender, Introspeksi, Kelas, NewBimbingan, NewIntrospeksi, NewKelas,
    NewPelanggaran, NewSanksi, Pelanggaran, Role, Sanksi, Siswa, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Classes,
    Sanctions,
    Remediation,
    Assignments,
    Violations,
    Guidance,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Classes => "classes",
            Self::Sanctions => "sanctions",
            Self::Remediation => "remediation",
            Self::Assignments => "assignments",
            Self::Violations => "violations",
            Self::Guidance => "guidance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    DeleteRows,
    NullReference,
}

struct CascadeRule {
    parent: Table,
    child: Table,
    effect: Effect,
}

/// Every delete runs the rules whose `parent` matches the deleted table. No
/// call site removes dependent rows by hand.
const CASCADE_RULES: &[CascadeRule] = &[
    CascadeRule {
        parent: Table::Users,
        child: Table::Assignments,
        effect: Effect::DeleteRows,
    },
    CascadeRule {
        parent: Table::Users,
        child: Table::Violations,
        effect: Effect::DeleteRows,
    },
    CascadeRule {
        parent: Table::Users,
        child: Table::Guidance,
        effect: Effect::DeleteRows,
    },
    CascadeRule {
        parent: Table::Users,
        child: Table::Classes,
        effect: Effect::NullReference,
    },
    CascadeRule {
        parent: Table::Classes,
        child: Table::Assignments,
        effect: Effect::NullReference,
    },
    CascadeRule {
        parent: Table::Sanctions,
        child: Table::Violations,
        effect: Effect::DeleteRows,
    },
    CascadeRule {
        parent: Table::Remediation,
        child: Table::Guidance,
        effect: Effect::DeleteRows,
    },
];

#[derive(Debug, Clone, Copy)]
enum RowKey<'a> {
    Username(&'a str),
    Id(i64),
}

/// Child rows touched by one delete, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub affected: Vec<(Table, usize)>,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.affected.iter().map(|(_, n)| *n).sum()
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().map_or(1, |m| m + 1)
}

fn required_text(field: &str, value: &str) -> CoreResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}

fn non_negative(field: &str, value: i64) -> CoreResult<i64> {
    if value < 0 {
        return Err(CoreError::validation(format!("{field} must be >= 0")));
    }
    Ok(value)
}

/// Raw user row as it arrives from a bulk import. Enum columns stay text so a
/// bad cell is reported against its row instead of failing the batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserRow {
    pub nama: String,
    pub username: String,
    pub jenis_kelamin: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRow {
    pub nipd: String,
    pub id_kelas: i64,
}

/// Where a bulk row came from: its position in a request or its line in an
/// uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPos {
    Row(usize),
    Line(usize),
}

impl fmt::Display for RowPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(n) => write!(f, "row {n}"),
            Self::Line(n) => write!(f, "line {n}"),
        }
    }
}

/// One bulk input row. A row that could not be read carries the reason and
/// is reported at its own position.
#[derive(Debug, Clone)]
pub struct BulkRow<T> {
    pub pos: RowPos,
    pub row: Result<T, String>,
}

impl<T> BulkRow<T> {
    /// Numbers request rows from 1.
    pub fn numbered(rows: impl IntoIterator<Item = Result<T, String>>) -> Vec<Self> {
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| Self {
                pos: RowPos::Row(i + 1),
                row,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub success_count: usize,
    pub errors: Vec<String>,
}

const SUMMARY_ERROR_LINES: usize = 5;

impl BulkOutcome {
    /// One-paragraph summary shown after an import: the first few error lines
    /// and a count of the ones left out.
    pub fn summary_message(&self) -> String {
        let mut msg = format!("{} row(s) imported successfully.", self.success_count);
        if self.errors.is_empty() {
            return msg;
        }
        msg.push_str(&format!("\n{} row(s) failed:", self.errors.len()));
        for e in self.errors.iter().take(SUMMARY_ERROR_LINES) {
            msg.push('\n');
            msg.push_str(e);
        }
        if self.errors.len() > SUMMARY_ERROR_LINES {
            msg.push_str(&format!(
                "\n...and {} more",
                self.errors.len() - SUMMARY_ERROR_LINES
            ));
        }
        msg
    }
}

/// The seven related collections. Owns every referential rule between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStore {
    users: Vec<User>,
    classes: Vec<Kelas>,
    sanctions: Vec<Sanksi>,
    remediation: Vec<Introspeksi>,
    assignments: Vec<Siswa>,
    violations: Vec<Pelanggaran>,
    guidance: Vec<Bimbingan>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn classes(&self) -> &[Kelas] {
        &self.classes
    }

    pub fn sanctions(&self) -> &[Sanksi] {
        &self.sanctions
    }

    pub fn remediation(&self) -> &[Introspeksi] {
        &self.remediation
    }

    pub fn assignments(&self) -> &[Siswa] {
        &self.assignments
    }

    pub fn violations(&self) -> &[Pelanggaran] {
        &self.violations
    }

    pub fn guidance(&self) -> &[Bimbingan] {
        &self.guidance
    }

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn class(&self, id: i64) -> Option<&Kelas> {
        self.classes.iter().find(|k| k.id == id)
    }

    pub fn sanction(&self, id: i64) -> Option<&Sanksi> {
        self.sanctions.iter().find(|s| s.id == id)
    }

    pub fn remediation_entry(&self, id: i64) -> Option<&Introspeksi> {
        self.remediation.iter().find(|i| i.id == id)
    }

    pub fn assignment(&self, nipd: &str) -> Option<&Siswa> {
        self.assignments.iter().find(|s| s.nipd == nipd)
    }

    pub fn violation(&self, id: i64) -> Option<&Pelanggaran> {
        self.violations.iter().find(|p| p.id == id)
    }

    pub fn guidance_record(&self, id: i64) -> Option<&Bimbingan> {
        self.guidance.iter().find(|b| b.id == id)
    }

    /// Class currently holding the student, if any.
    pub fn class_of(&self, nipd: &str) -> Option<&Kelas> {
        self.assignment(nipd)
            .and_then(|s| s.id_kelas)
            .and_then(|id| self.class(id))
    }

    fn require_student(&self, nipd: &str) -> CoreResult<&User> {
        match self.user(nipd) {
            Some(u) if u.role == Role::Student => Ok(u),
            _ => Err(CoreError::not_found("student", nipd)),
        }
    }

    fn require_teacher(&self, username: &str) -> CoreResult<&User> {
        match self.user(username) {
            Some(u) if u.role == Role::Teacher => Ok(u),
            _ => Err(CoreError::not_found("teacher", username)),
        }
    }

    fn check_homeroom(&self, id_guru: Option<&str>) -> CoreResult<()> {
        if let Some(g) = id_guru {
            self.require_teacher(g)?;
        }
        Ok(())
    }

    fn check_class_ref(&self, id_kelas: Option<i64>) -> CoreResult<()> {
        if let Some(id) = id_kelas {
            if self.class(id).is_none() {
                return Err(CoreError::not_found("class", id));
            }
        }
        Ok(())
    }

    /// Runs the insert-time rules over a store that arrived whole, such as a
    /// restored backup: keys are unique and every reference resolves.
    pub fn check_integrity(&self) -> CoreResult<()> {
        fn unique<K: std::hash::Hash + Eq + ToString>(
            entity: &'static str,
            keys: impl Iterator<Item = K>,
        ) -> CoreResult<()> {
            let mut seen = HashSet::new();
            for k in keys {
                let shown = k.to_string();
                if !seen.insert(k) {
                    return Err(CoreError::duplicate(entity, shown));
                }
            }
            Ok(())
        }

        unique("user", self.users.iter().map(|u| u.username.as_str()))?;
        unique("class", self.classes.iter().map(|k| k.id))?;
        unique("sanction", self.sanctions.iter().map(|s| s.id))?;
        unique("remediation entry", self.remediation.iter().map(|i| i.id))?;
        unique("student assignment", self.assignments.iter().map(|s| s.nipd.as_str()))?;
        unique("violation", self.violations.iter().map(|p| p.id))?;
        unique("guidance record", self.guidance.iter().map(|b| b.id))?;

        for u in &self.users {
            required_text("username", &u.username)?;
            required_text("nama", &u.nama)?;
        }
        for k in &self.classes {
            required_text("kelas", &k.kelas)?;
            self.check_homeroom(k.id_guru.as_deref())?;
        }
        for s in &self.sanctions {
            non_negative("point_pelanggar", s.point_pelanggar)?;
        }
        for i in &self.remediation {
            non_negative("point_perbaikan", i.point_perbaikan)?;
        }
        for a in &self.assignments {
            self.require_student(&a.nipd)?;
            self.check_class_ref(a.id_kelas)?;
        }
        for p in &self.violations {
            self.require_student(&p.nipd)?;
            if self.sanction(p.id_sanksi).is_none() {
                return Err(CoreError::not_found("sanction", p.id_sanksi));
            }
        }
        for b in &self.guidance {
            self.require_student(&b.nipd)?;
            if self.remediation_entry(b.id_perbaikan).is_none() {
                return Err(CoreError::not_found("remediation entry", b.id_perbaikan));
            }
        }
        Ok(())
    }

    // ---- users ----

    pub fn insert_user(&mut self, user: User) -> CoreResult<User> {
        let user = User {
            username: required_text("username", &user.username)?,
            nama: required_text("nama", &user.nama)?,
            ..user
        };
        if self.user(&user.username).is_some() {
            return Err(CoreError::duplicate("user", &user.username));
        }
        self.users.push(user.clone());
        Ok(user)
    }

    fn has_student_rows(&self, nipd: &str) -> bool {
        self.assignment(nipd).is_some()
            || self.violations.iter().any(|p| p.nipd == nipd)
            || self.guidance.iter().any(|b| b.nipd == nipd)
    }

    /// Replaces the row with the same username and returns the previous copy.
    /// A teacher moved to another role stops being homeroom teacher; a
    /// student with an assignment or records keeps the student role.
    pub fn update_user(&mut self, user: User) -> CoreResult<(User, CascadeReport)> {
        let nama = required_text("nama", &user.nama)?;
        let Some(pos) = self.users.iter().position(|u| u.username == user.username) else {
            return Err(CoreError::not_found("user", &user.username));
        };
        let was = self.users[pos].role;
        if was == Role::Student && user.role != Role::Student && self.has_student_rows(&user.username)
        {
            return Err(CoreError::validation(format!(
                "{} still has a class assignment or discipline records",
                user.username
            )));
        }
        let username = user.username.clone();
        let leaves_teacher = was == Role::Teacher && user.role != Role::Teacher;
        let previous = std::mem::replace(&mut self.users[pos], User { nama, ..user });
        let report = if leaves_teacher {
            self.cascade_only(Table::Users, RowKey::Username(&username), |child| {
                child == Table::Classes
            })
        } else {
            CascadeReport::default()
        };
        Ok((previous, report))
    }

    pub fn delete_user(&mut self, username: &str) -> CoreResult<(User, CascadeReport)> {
        let Some(pos) = self.users.iter().position(|u| u.username == username) else {
            return Err(CoreError::not_found("user", username));
        };
        let removed = self.users.remove(pos);
        let report = self.cascade(Table::Users, RowKey::Username(username));
        Ok((removed, report))
    }

    /// Validates every row independently against the store and the rows
    /// before it. Valid rows are appended together; rejected rows are
    /// described in input order.
    pub fn add_users_bulk(&mut self, rows: &[BulkRow<UserRow>]) -> BulkOutcome {
        let mut errors = Vec::new();
        let mut accepted: Vec<User> = Vec::new();
        let mut batch: HashSet<String> = HashSet::new();

        for BulkRow { pos, row } in rows {
            let row = match row {
                Ok(row) => row,
                Err(reason) => {
                    errors.push(format!("{pos}: {reason}"));
                    continue;
                }
            };
            let nama = row.nama.trim();
            let username = row.username.trim();
            let gender_raw = row.jenis_kelamin.trim();
            let role_raw = row.role.trim();
            if nama.is_empty() || username.is_empty() || gender_raw.is_empty() || role_raw.is_empty()
            {
                errors.push(format!(
                    "{} ({} / {}): missing required field(s)",
                    pos,
                    if nama.is_empty() { "no name" } else { nama },
                    if username.is_empty() { "no username" } else { username },
                ));
                continue;
            }
            let Some(jenis_kelamin) = Gender::parse(gender_raw) else {
                errors.push(format!("{pos} ({username}): invalid jenis_kelamin: {gender_raw}"));
                continue;
            };
            let Some(role) = Role::parse(role_raw) else {
                errors.push(format!("{pos} ({username}): invalid role: {role_raw}"));
                continue;
            };
            if self.user(username).is_some() || batch.contains(username) {
                errors.push(format!("{pos}: username already exists: {username}"));
                continue;
            }
            batch.insert(username.to_string());
            accepted.push(User {
                username: username.to_string(),
                nama: nama.to_string(),
                jenis_kelamin,
                role,
                photo: None,
            });
        }

        let success_count = accepted.len();
        self.users.extend(accepted);
        BulkOutcome {
            success_count,
            errors,
        }
    }

    // ---- classes ----

    pub fn insert_class(&mut self, new: NewKelas) -> CoreResult<Kelas> {
        let kelas = required_text("kelas", &new.kelas)?;
        self.check_homeroom(new.id_guru.as_deref())?;
        let row = Kelas {
            id: next_id(self.classes.iter().map(|k| k.id)),
            kelas,
            tingkat: new.tingkat,
            id_guru: new.id_guru,
        };
        self.classes.push(row.clone());
        Ok(row)
    }

    pub fn update_class(&mut self, row: Kelas) -> CoreResult<Kelas> {
        let kelas = required_text("kelas", &row.kelas)?;
        self.check_homeroom(row.id_guru.as_deref())?;
        let Some(slot) = self.classes.iter_mut().find(|k| k.id == row.id) else {
            return Err(CoreError::not_found("class", row.id));
        };
        Ok(std::mem::replace(slot, Kelas { kelas, ..row }))
    }

    pub fn delete_class(&mut self, id: i64) -> CoreResult<(Kelas, CascadeReport)> {
        let Some(pos) = self.classes.iter().position(|k| k.id == id) else {
            return Err(CoreError::not_found("class", id));
        };
        let removed = self.classes.remove(pos);
        let report = self.cascade(Table::Classes, RowKey::Id(id));
        Ok((removed, report))
    }

    // ---- sanctions ----

    pub fn insert_sanction(&mut self, new: NewSanksi) -> CoreResult<Sanksi> {
        let row = Sanksi {
            id: next_id(self.sanctions.iter().map(|s| s.id)),
            desk_kesalahan: required_text("desk_kesalahan", &new.desk_kesalahan)?,
            jenis_sanksi: new.jenis_sanksi,
            point_pelanggar: non_negative("point_pelanggar", new.point_pelanggar)?,
        };
        self.sanctions.push(row.clone());
        Ok(row)
    }

    pub fn update_sanction(&mut self, row: Sanksi) -> CoreResult<Sanksi> {
        let desk_kesalahan = required_text("desk_kesalahan", &row.desk_kesalahan)?;
        non_negative("point_pelanggar", row.point_pelanggar)?;
        let Some(slot) = self.sanctions.iter_mut().find(|s| s.id == row.id) else {
            return Err(CoreError::not_found("sanction", row.id));
        };
        Ok(std::mem::replace(slot, Sanksi { desk_kesalahan, ..row }))
    }

    pub fn delete_sanction(&mut self, id: i64) -> CoreResult<(Sanksi, CascadeReport)> {
        let Some(pos) = self.sanctions.iter().position(|s| s.id == id) else {
            return Err(CoreError::not_found("sanction", id));
        };
        let removed = self.sanctions.remove(pos);
        let report = self.cascade(Table::Sanctions, RowKey::Id(id));
        Ok((removed, report))
    }

    // ---- remediation catalog ----

    pub fn insert_remediation(&mut self, new: NewIntrospeksi) -> CoreResult<Introspeksi> {
        let row = Introspeksi {
            id: next_id(self.remediation.iter().map(|i| i.id)),
            desk_perbaikan: required_text("desk_perbaikan", &new.desk_perbaikan)?,
            jenis_perbaikan: new.jenis_perbaikan,
            point_perbaikan: non_negative("point_perbaikan", new.point_perbaikan)?,
        };
        self.remediation.push(row.clone());
        Ok(row)
    }

    pub fn update_remediation(&mut self, row: Introspeksi) -> CoreResult<Introspeksi> {
        let desk_perbaikan = required_text("desk_perbaikan", &row.desk_perbaikan)?;
        non_negative("point_perbaikan", row.point_perbaikan)?;
        let Some(slot) = self.remediation.iter_mut().find(|i| i.id == row.id) else {
            return Err(CoreError::not_found("remediation entry", row.id));
        };
        Ok(std::mem::replace(
            slot,
            Introspeksi {
                desk_perbaikan,
                ..row
            },
        ))
    }

    pub fn delete_remediation(&mut self, id: i64) -> CoreResult<(Introspeksi, CascadeReport)> {
        let Some(pos) = self.remediation.iter().position(|i| i.id == id) else {
            return Err(CoreError::not_found("remediation entry", id));
        };
        let removed = self.remediation.remove(pos);
        let report = self.cascade(Table::Remediation, RowKey::Id(id));
        Ok((removed, report))
    }

    // ---- student class assignments ----

    pub fn insert_assignment(&mut self, row: Siswa) -> CoreResult<Siswa> {
        self.require_student(&row.nipd)?;
        self.check_class_ref(row.id_kelas)?;
        if self.assignment(&row.nipd).is_some() {
            return Err(CoreError::duplicate("student assignment", &row.nipd));
        }
        self.assignments.push(row.clone());
        Ok(row)
    }

    pub fn update_assignment(&mut self, row: Siswa) -> CoreResult<Siswa> {
        self.check_class_ref(row.id_kelas)?;
        let Some(slot) = self.assignments.iter_mut().find(|s| s.nipd == row.nipd) else {
            return Err(CoreError::not_found("student assignment", &row.nipd));
        };
        Ok(std::mem::replace(slot, row))
    }

    pub fn delete_assignment(&mut self, nipd: &str) -> CoreResult<Siswa> {
        let Some(pos) = self.assignments.iter().position(|s| s.nipd == nipd) else {
            return Err(CoreError::not_found("student assignment", nipd));
        };
        Ok(self.assignments.remove(pos))
    }

    /// Upserts one assignment per valid row. A student named twice in the
    /// same batch keeps the first row.
    pub fn assign_students_bulk(&mut self, rows: &[BulkRow<AssignmentRow>]) -> BulkOutcome {
        let mut errors = Vec::new();
        let mut accepted: Vec<Siswa> = Vec::new();
        let mut batch: HashSet<String> = HashSet::new();

        for BulkRow { pos, row } in rows {
            let row = match row {
                Ok(row) => row,
                Err(reason) => {
                    errors.push(format!("{pos}: {reason}"));
                    continue;
                }
            };
            let nipd = row.nipd.trim();
            if nipd.is_empty() {
                errors.push(format!("{pos}: missing required field(s)"));
                continue;
            }
            if let Err(e) = self.require_student(nipd) {
                errors.push(format!("{pos}: {e}"));
                continue;
            }
            if let Err(e) = self.check_class_ref(Some(row.id_kelas)) {
                errors.push(format!("{pos} ({nipd}): {e}"));
                continue;
            }
            if !batch.insert(nipd.to_string()) {
                errors.push(format!("{pos}: student listed twice in batch: {nipd}"));
                continue;
            }
            accepted.push(Siswa {
                nipd: nipd.to_string(),
                id_kelas: Some(row.id_kelas),
            });
        }

        let success_count = accepted.len();
        for row in accepted {
            match self.assignments.iter_mut().find(|s| s.nipd == row.nipd) {
                Some(existing) => existing.id_kelas = row.id_kelas,
                None => self.assignments.push(row),
            }
        }
        BulkOutcome {
            success_count,
            errors,
        }
    }

    // ---- violation records ----

    pub fn insert_violation(&mut self, new: NewPelanggaran) -> CoreResult<Pelanggaran> {
        self.require_student(&new.nipd)?;
        if self.sanction(new.id_sanksi).is_none() {
            return Err(CoreError::not_found("sanction", new.id_sanksi));
        }
        let row = Pelanggaran {
            id: next_id(self.violations.iter().map(|p| p.id)),
            nipd: new.nipd,
            id_sanksi: new.id_sanksi,
            tanggal: new.tanggal,
        };
        self.violations.push(row.clone());
        Ok(row)
    }

    pub fn update_violation(&mut self, row: Pelanggaran) -> CoreResult<Pelanggaran> {
        self.require_student(&row.nipd)?;
        if self.sanction(row.id_sanksi).is_none() {
            return Err(CoreError::not_found("sanction", row.id_sanksi));
        }
        let Some(slot) = self.violations.iter_mut().find(|p| p.id == row.id) else {
            return Err(CoreError::not_found("violation", row.id));
        };
        Ok(std::mem::replace(slot, row))
    }

    pub fn delete_violation(&mut self, id: i64) -> CoreResult<Pelanggaran> {
        let Some(pos) = self.violations.iter().position(|p| p.id == id) else {
            return Err(CoreError::not_found("violation", id));
        };
        Ok(self.violations.remove(pos))
    }

    // ---- guidance records ----

    pub fn insert_guidance(&mut self, new: NewBimbingan) -> CoreResult<Bimbingan> {
        self.require_student(&new.nipd)?;
        if self.remediation_entry(new.id_perbaikan).is_none() {
            return Err(CoreError::not_found("remediation entry", new.id_perbaikan));
        }
        let row = Bimbingan {
            id: next_id(self.guidance.iter().map(|b| b.id)),
            nipd: new.nipd,
            id_perbaikan: new.id_perbaikan,
            tanggal: new.tanggal,
        };
        self.guidance.push(row.clone());
        Ok(row)
    }

    pub fn update_guidance(&mut self, row: Bimbingan) -> CoreResult<Bimbingan> {
        self.require_student(&row.nipd)?;
        if self.remediation_entry(row.id_perbaikan).is_none() {
            return Err(CoreError::not_found("remediation entry", row.id_perbaikan));
        }
        let Some(slot) = self.guidance.iter_mut().find(|b| b.id == row.id) else {
            return Err(CoreError::not_found("guidance", row.id));
        };
        Ok(std::mem::replace(slot, row))
    }

    pub fn delete_guidance(&mut self, id: i64) -> CoreResult<Bimbingan> {
        let Some(pos) = self.guidance.iter().position(|b| b.id == id) else {
            return Err(CoreError::not_found("guidance", id));
        };
        Ok(self.guidance.remove(pos))
    }

    fn cascade(&mut self, parent: Table, key: RowKey<'_>) -> CascadeReport {
        self.cascade_only(parent, key, |_| true)
    }

    fn cascade_only(
        &mut self,
        parent: Table,
        key: RowKey<'_>,
        child: impl Fn(Table) -> bool,
    ) -> CascadeReport {
        let mut report = CascadeReport::default();
        for rule in CASCADE_RULES
            .iter()
            .filter(|r| r.parent == parent && child(r.child))
        {
            let n = match (rule.child, rule.effect, key) {
                (Table::Assignments, Effect::DeleteRows, RowKey::Username(u)) => {
                    retain_counting(&mut self.assignments, |s| s.nipd != u)
                }
                (Table::Violations, Effect::DeleteRows, RowKey::Username(u)) => {
                    retain_counting(&mut self.violations, |p| p.nipd != u)
                }
                (Table::Guidance, Effect::DeleteRows, RowKey::Username(u)) => {
                    retain_counting(&mut self.guidance, |b| b.nipd != u)
                }
                (Table::Classes, Effect::NullReference, RowKey::Username(u)) => {
                    let mut n = 0;
                    for k in self.classes.iter_mut() {
                        if k.id_guru.as_deref() == Some(u) {
                            k.id_guru = None;
                            n += 1;
                        }
                    }
                    n
                }
                (Table::Assignments, Effect::NullReference, RowKey::Id(id)) => {
                    let mut n = 0;
                    for s in self.assignments.iter_mut() {
                        if s.id_kelas == Some(id) {
                            s.id_kelas = None;
                            n += 1;
                        }
                    }
                    n
                }
                (Table::Violations, Effect::DeleteRows, RowKey::Id(id)) => {
                    retain_counting(&mut self.violations, |p| p.id_sanksi != id)
                }
                (Table::Guidance, Effect::DeleteRows, RowKey::Id(id)) => {
                    retain_counting(&mut self.guidance, |b| b.id_perbaikan != id)
                }
                _ => 0,
            };
            if n > 0 {
                tracing::trace!(
                    parent = parent.as_str(),
                    child = rule.child.as_str(),
                    rows = n,
                    "cascade rule applied"
                );
            }
            report.affected.push((rule.child, n));
        }
        report
    }
}

fn retain_counting<T>(rows: &mut Vec<T>, keep: impl FnMut(&T) -> bool) -> usize {
    let before = rows.len();
    rows.retain(keep);
    before - rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JenisPerbaikan, JenisSanksi, Tingkat};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("date")
    }

    fn user(username: &str, role: Role) -> User {
        User {
            username: username.into(),
            nama: format!("User {username}"),
            jenis_kelamin: Gender::Male,
            role,
            photo: None,
        }
    }

    fn fixture() -> EntityStore {
        let mut s = EntityStore::new();
        s.insert_user(user("guru1", Role::Teacher)).expect("guru");
        s.insert_user(user("S1", Role::Student)).expect("s1");
        s.insert_user(user("S2", Role::Student)).expect("s2");
        s.insert_class(NewKelas {
            kelas: "X-1".into(),
            tingkat: Tingkat::X,
            id_guru: Some("guru1".into()),
        })
        .expect("class");
        s.insert_sanction(NewSanksi {
            desk_kesalahan: "Terlambat".into(),
            jenis_sanksi: JenisSanksi::Ringan,
            point_pelanggar: 10,
        })
        .expect("sanction");
        s.insert_remediation(NewIntrospeksi {
            desk_perbaikan: "Membersihkan kelas".into(),
            jenis_perbaikan: JenisPerbaikan::Mudah,
            point_perbaikan: 5,
        })
        .expect("remediation");
        s
    }

    fn violation(s: &mut EntityStore, nipd: &str, id_sanksi: i64) -> Pelanggaran {
        s.insert_violation(NewPelanggaran {
            nipd: nipd.into(),
            id_sanksi,
            tanggal: day(1),
        })
        .expect("violation")
    }

    #[test]
    fn ids_are_sequential_then_max_plus_one_after_delete() {
        let mut s = fixture();
        let ids: Vec<i64> = (0..4).map(|_| violation(&mut s, "S1", 1).id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        s.delete_violation(2).expect("delete 2");
        assert_eq!(violation(&mut s, "S1", 1).id, 5);
        s.delete_violation(5).expect("delete 5");
        s.delete_violation(4).expect("delete 4");
        // max of the remaining rows is 3
        assert_eq!(violation(&mut s, "S1", 1).id, 4);
    }

    #[test]
    fn duplicate_usernames_and_assignments_are_rejected() {
        let mut s = fixture();
        let err = s.insert_user(user("S1", Role::Student)).unwrap_err();
        assert_eq!(err.code(), "duplicate_key");

        s.insert_assignment(Siswa {
            nipd: "S1".into(),
            id_kelas: Some(1),
        })
        .expect("assign");
        let err = s
            .insert_assignment(Siswa {
                nipd: "S1".into(),
                id_kelas: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_key");
        assert_eq!(s.assignments().len(), 1);
    }

    #[test]
    fn inserts_reject_dangling_references() {
        let mut s = fixture();
        let err = s
            .insert_violation(NewPelanggaran {
                nipd: "S1".into(),
                id_sanksi: 99,
                tanggal: day(2),
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        // staff accounts cannot carry discipline records
        let err = s
            .insert_guidance(NewBimbingan {
                nipd: "guru1".into(),
                id_perbaikan: 1,
                tanggal: day(2),
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = s
            .insert_class(NewKelas {
                kelas: "X-2".into(),
                tingkat: Tingkat::X,
                id_guru: Some("S1".into()),
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn negative_points_and_blank_text_fail_validation() {
        let mut s = fixture();
        let err = s
            .insert_sanction(NewSanksi {
                desk_kesalahan: "Bolos".into(),
                jenis_sanksi: JenisSanksi::Berat,
                point_pelanggar: -1,
            })
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");

        let err = s
            .insert_remediation(NewIntrospeksi {
                desk_perbaikan: "   ".into(),
                jenis_perbaikan: JenisPerbaikan::Sulit,
                point_perbaikan: 3,
            })
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn delete_user_cascades_to_every_reference() {
        let mut s = fixture();
        s.insert_assignment(Siswa {
            nipd: "S1".into(),
            id_kelas: Some(1),
        })
        .expect("assign");
        violation(&mut s, "S1", 1);
        violation(&mut s, "S2", 1);
        s.insert_guidance(NewBimbingan {
            nipd: "S1".into(),
            id_perbaikan: 1,
            tanggal: day(3),
        })
        .expect("guidance");

        let (removed, report) = s.delete_user("S1").expect("delete");
        assert_eq!(removed.username, "S1");
        assert_eq!(report.total(), 3);
        assert!(s.assignments().iter().all(|r| r.nipd != "S1"));
        assert!(s.violations().iter().all(|r| r.nipd != "S1"));
        assert!(s.guidance().iter().all(|r| r.nipd != "S1"));
        assert_eq!(s.violations().len(), 1);

        s.delete_user("guru1").expect("delete teacher");
        assert_eq!(s.class(1).expect("class kept").id_guru, None);
    }

    #[test]
    fn delete_class_unassigns_without_removing_students() {
        let mut s = fixture();
        s.insert_assignment(Siswa {
            nipd: "S1".into(),
            id_kelas: Some(1),
        })
        .expect("assign");
        s.delete_class(1).expect("delete class");
        let a = s.assignment("S1").expect("assignment kept");
        assert_eq!(a.id_kelas, None);
        assert!(s.user("S1").is_some());
    }

    #[test]
    fn delete_catalog_entries_cascades_to_records() {
        let mut s = fixture();
        violation(&mut s, "S1", 1);
        violation(&mut s, "S2", 1);
        s.insert_guidance(NewBimbingan {
            nipd: "S1".into(),
            id_perbaikan: 1,
            tanggal: day(4),
        })
        .expect("guidance");

        let (_, report) = s.delete_sanction(1).expect("delete sanction");
        assert_eq!(report.affected, vec![(Table::Violations, 2)]);
        assert!(s.violations().is_empty());

        s.delete_remediation(1).expect("delete remediation");
        assert!(s.guidance().is_empty());
    }

    #[test]
    fn update_and_delete_of_missing_rows_report_not_found() {
        let mut s = fixture();
        assert_eq!(s.delete_class(42).unwrap_err().code(), "not_found");
        assert_eq!(s.delete_user("nobody").unwrap_err().code(), "not_found");
        let err = s
            .update_sanction(Sanksi {
                id: 7,
                desk_kesalahan: "x".into(),
                jenis_sanksi: JenisSanksi::Sedang,
                point_pelanggar: 1,
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn bulk_users_keep_first_of_in_batch_duplicates() {
        let mut s = fixture();
        let rows = vec![
            UserRow {
                nama: "Andi".into(),
                username: "N1".into(),
                jenis_kelamin: "laki-laki".into(),
                role: "siswa".into(),
            },
            UserRow {
                nama: "Budi".into(),
                username: "".into(),
                jenis_kelamin: "laki-laki".into(),
                role: "siswa".into(),
            },
            UserRow {
                nama: "Andi Kedua".into(),
                username: "N1".into(),
                jenis_kelamin: "laki-laki".into(),
                role: "siswa".into(),
            },
            UserRow {
                nama: "Citra".into(),
                username: "N3".into(),
                jenis_kelamin: "Perempuan".into(),
                role: "Guru".into(),
            },
            UserRow {
                nama: "Existing".into(),
                username: "S2".into(),
                jenis_kelamin: "perempuan".into(),
                role: "siswa".into(),
            },
        ];
        let out = s.add_users_bulk(&BulkRow::numbered(rows.into_iter().map(Ok)));
        assert_eq!(out.success_count, 2);
        assert_eq!(
            out.errors,
            vec![
                "row 2 (Budi / no username): missing required field(s)".to_string(),
                "row 3: username already exists: N1".to_string(),
                "row 5: username already exists: S2".to_string(),
            ]
        );
        assert_eq!(s.user("N1").expect("first kept").nama, "Andi");
        assert_eq!(s.user("N3").expect("teacher").role, Role::Teacher);
    }

    #[test]
    fn bulk_assign_upserts_and_reports_bad_rows() {
        let mut s = fixture();
        s.insert_class(NewKelas {
            kelas: "XI-1".into(),
            tingkat: Tingkat::XI,
            id_guru: None,
        })
        .expect("class 2");
        s.insert_assignment(Siswa {
            nipd: "S1".into(),
            id_kelas: None,
        })
        .expect("assign");

        let rows = [("S1", 2), ("S2", 9), ("S2", 1), ("S1", 1)].map(|(nipd, id_kelas)| {
            Ok(AssignmentRow {
                nipd: nipd.into(),
                id_kelas,
            })
        });
        let out = s.assign_students_bulk(&BulkRow::numbered(rows));
        assert_eq!(out.success_count, 2);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(s.assignments().len(), 2);
        assert_eq!(s.assignment("S1").expect("s1").id_kelas, Some(2));
        assert_eq!(s.assignment("S2").expect("s2").id_kelas, Some(1));
    }

    #[test]
    fn integrity_check_finds_duplicates_and_dangling_rows() {
        let mut s = fixture();
        violation(&mut s, "S1", 1);
        assert!(s.check_integrity().is_ok());

        let mut dup = s.clone();
        dup.violations.push(dup.violations[0].clone());
        assert_eq!(dup.check_integrity().unwrap_err().code(), "duplicate_key");

        let mut dangling = s.clone();
        dangling.sanctions.clear();
        assert_eq!(dangling.check_integrity().unwrap_err().code(), "not_found");

        let mut orphan = s.clone();
        orphan.users.retain(|u| u.username != "guru1");
        assert_eq!(orphan.check_integrity().unwrap_err().code(), "not_found");
    }

    #[test]
    fn unreadable_rows_are_reported_in_place() {
        let mut s = fixture();
        let rows = vec![
            BulkRow {
                pos: RowPos::Line(2),
                row: Ok(AssignmentRow {
                    nipd: "S1".into(),
                    id_kelas: 1,
                }),
            },
            BulkRow {
                pos: RowPos::Line(3),
                row: Err("unknown class: XII Z".into()),
            },
            BulkRow {
                pos: RowPos::Line(4),
                row: Ok(AssignmentRow {
                    nipd: "S2".into(),
                    id_kelas: 5,
                }),
            },
        ];
        let out = s.assign_students_bulk(&rows);
        assert_eq!(out.success_count, 1);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0], "line 3: unknown class: XII Z");
        assert!(out.errors[1].starts_with("line 4 (S2): "), "{:?}", out.errors);
        assert_eq!(s.assignment("S1").and_then(|a| a.id_kelas), Some(1));
    }

    #[test]
    fn summary_message_caps_error_lines() {
        let out = BulkOutcome {
            success_count: 1,
            errors: (1..=8).map(|i| format!("row {i}: bad")).collect(),
        };
        let msg = out.summary_message();
        assert!(msg.contains("row 5: bad"));
        assert!(!msg.contains("row 6: bad"));
        assert!(msg.ends_with("...and 3 more"));
    }
}
