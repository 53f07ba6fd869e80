use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityLog, LogFilter};
use crate::calc::{self, DateRange, RecordKind};
use crate::db::LocalState;
use crate::errors::{CoreError, CoreResult};
use crate::model::{
    AppSettings, Bimbingan, Introspeksi, Kelas, LogAction, LogEntity, LogEntry, NewBimbingan,
    NewIntrospeksi, NewKelas, NewPelanggaran, NewSanksi, Pelanggaran, Role, Sanksi, Siswa, User,
};
use crate::store::{AssignmentRow, BulkOutcome, BulkRow, EntityStore, UserRow};

/// Accepted by `login` and `change_password` for every account.
pub const SHARED_PASSWORD: &str = "password";
pub const MAX_IMAGE_CHARS: usize = 500 * 1024;

/// Everything a backup bundle carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub store: EntityStore,
    pub logs: Vec<LogEntry>,
    pub settings: AppSettings,
}

/// Single entry point over the store, the aggregation functions and the
/// activity log. Every mutation validates, applies, then records one entry.
pub struct Dashboard {
    store: EntityStore,
    log: ActivityLog,
    session: Option<User>,
    settings: AppSettings,
    local: Option<LocalState>,
    latency: Duration,
}

fn check_image(field: &str, value: &str) -> CoreResult<()> {
    if !value.starts_with("data:image/") {
        return Err(CoreError::validation(format!(
            "{field} must be a data:image URI"
        )));
    }
    if value.len() > MAX_IMAGE_CHARS {
        return Err(CoreError::validation(format!(
            "{field} is larger than {} KiB",
            MAX_IMAGE_CHARS / 1024
        )));
    }
    Ok(())
}

impl Dashboard {
    pub fn new(store: EntityStore, latency: Duration) -> Self {
        Self {
            store,
            log: ActivityLog::new(),
            session: None,
            settings: AppSettings::default(),
            local: None,
            latency,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.local.as_ref().map(|l| l.path())
    }

    fn pause(&self, num: u32, den: u32) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency * num / den);
        }
    }

    /// Session user, or the last one persisted when the in-memory session
    /// has already been cleared.
    fn actor(&self) -> Option<String> {
        if let Some(u) = &self.session {
            return Some(u.username.clone());
        }
        self.local
            .as_ref()
            .and_then(|l| l.load_session().ok().flatten())
            .map(|u| u.username)
    }

    fn audit(&mut self, action: LogAction, entity: LogEntity, details: String) {
        let actor = self.actor();
        self.audit_as(actor, action, entity, details);
    }

    fn audit_as(
        &mut self,
        actor: Option<String>,
        action: LogAction,
        entity: LogEntity,
        details: String,
    ) {
        tracing::info!(
            action = action.as_str(),
            entity = entity.as_str(),
            actor = actor.as_deref().unwrap_or("-"),
            "{details}"
        );
        self.log.record(actor.as_deref(), action, entity, details);
    }

    fn persist_session(&self) {
        if let Some(local) = &self.local {
            if let Err(e) = local.save_session(self.session.as_ref()) {
                tracing::warn!(error = %format!("{e:#}"), "failed to persist session");
            }
        }
    }

    /// Keeps the cached session copy in step with the store.
    fn refresh_session(&mut self, username: &str) {
        if self.session.as_ref().map(|u| u.username.as_str()) != Some(username) {
            return;
        }
        if let Some(fresh) = self.store.user(username).cloned() {
            self.session = Some(fresh);
            self.persist_session();
        }
    }

    fn display_name(&self, username: &str) -> String {
        self.store
            .user(username)
            .map(|u| u.nama.clone())
            .unwrap_or_else(|| username.to_string())
    }

    // ---- workspace and session ----

    /// Opens persisted state under `path`: settings merge over defaults and a
    /// saved session is restored when its user still exists.
    pub fn open_workspace(&mut self, path: &Path) -> CoreResult<()> {
        let local = LocalState::open(path)?;
        self.settings = local.load_settings()?;
        match local.load_session()? {
            Some(saved) if self.store.user(&saved.username).is_some() => {
                // the persisted copy wins over the seeded one
                match self.store.update_user(saved.clone()) {
                    Ok(_) => {
                        tracing::info!(username = %saved.username, "session restored");
                        self.session = Some(saved);
                    }
                    Err(e) => {
                        tracing::warn!(
                            username = %saved.username,
                            error = %e,
                            "persisted session user rejected"
                        );
                        local.save_session(None)?;
                        self.session = None;
                    }
                }
            }
            Some(saved) => {
                tracing::warn!(username = %saved.username, "dropping session for unknown user");
                local.save_session(None)?;
                self.session = None;
            }
            None => self.session = None,
        }
        tracing::info!(path = %path.to_string_lossy(), "workspace opened");
        self.local = Some(local);
        Ok(())
    }

    pub fn login(&mut self, username: &str, password: &str) -> CoreResult<User> {
        self.pause(1, 1);
        let found = self.store.user(username.trim()).cloned();
        let Some(user) = found.filter(|_| password == SHARED_PASSWORD) else {
            tracing::debug!(username, "login rejected");
            return Err(CoreError::InvalidCredentials("invalid username or password"));
        };
        self.session = Some(user.clone());
        self.persist_session();
        self.audit(
            LogAction::Login,
            LogEntity::Auth,
            format!("User {} signed in.", user.nama),
        );
        Ok(user)
    }

    pub fn logout(&mut self) -> Option<User> {
        self.pause(1, 2);
        let user = self.session.clone()?;
        self.audit(
            LogAction::Logout,
            LogEntity::Auth,
            format!("User {} signed out.", user.nama),
        );
        self.session = None;
        self.persist_session();
        Some(user)
    }

    /// Accepts the request without revealing whether the account exists.
    pub fn reset_password_request(&self, email_or_username: &str) -> CoreResult<()> {
        let who = email_or_username.trim();
        if who.is_empty() {
            return Err(CoreError::validation("email or username must not be empty"));
        }
        self.pause(1, 1);
        tracing::info!(requested_for = who, "password reset requested");
        Ok(())
    }

    pub fn change_password(&mut self, current: &str, new_password: &str) -> CoreResult<()> {
        let Some(user) = self.session.clone() else {
            return Err(CoreError::InvalidCredentials("not signed in"));
        };
        if new_password.trim().is_empty() {
            return Err(CoreError::validation("new password must not be empty"));
        }
        self.pause(1, 2);
        if current != SHARED_PASSWORD {
            return Err(CoreError::InvalidCredentials("current password is wrong"));
        }
        self.audit(
            LogAction::Update,
            LogEntity::Profile,
            format!("User {} changed their password.", user.username),
        );
        Ok(())
    }

    pub fn admin_reset_password(&mut self, username: &str) -> CoreResult<()> {
        let Some(target) = self.store.user(username).cloned() else {
            return Err(CoreError::not_found("user", username));
        };
        self.pause(1, 2);
        self.audit(
            LogAction::Update,
            LogEntity::Users,
            format!("Reset password for user: {} ({})", target.nama, target.username),
        );
        Ok(())
    }

    // ---- users ----

    pub fn add_user(&mut self, user: User) -> CoreResult<User> {
        if let Some(photo) = &user.photo {
            check_image("photo", photo)?;
        }
        let user = self.store.insert_user(user)?;
        self.audit(
            LogAction::Create,
            LogEntity::Users,
            format!("Added user: {} ({})", user.nama, user.username),
        );
        Ok(user)
    }

    pub fn add_users_bulk(&mut self, rows: &[BulkRow<UserRow>]) -> BulkOutcome {
        let outcome = self.store.add_users_bulk(rows);
        self.audit(
            LogAction::Import,
            LogEntity::Users,
            format!(
                "Imported {} new user(s), {} row(s) failed.",
                outcome.success_count,
                outcome.errors.len()
            ),
        );
        outcome
    }

    /// Clears the letterhead signatory when it names `username`. On a failed
    /// save the store goes back to `before`.
    fn drop_signatory(&mut self, username: &str, before: EntityStore) -> CoreResult<()> {
        if self.settings.sp_signatory_username.as_deref() != Some(username) {
            return Ok(());
        }
        let mut next = self.settings.clone();
        next.sp_signatory_username = None;
        if let Err(e) = self.save_settings(next) {
            self.store = before;
            return Err(e);
        }
        Ok(())
    }

    pub fn update_user(&mut self, user: User) -> CoreResult<User> {
        if let Some(photo) = &user.photo {
            check_image("photo", photo)?;
        }
        let username = user.username.clone();
        let before = self.store.clone();
        let (_, cascade) = self.store.update_user(user)?;
        if self.store.user(&username).map(|u| u.role) != Some(Role::Teacher) {
            self.drop_signatory(&username, before)?;
        }
        if cascade.total() > 0 {
            tracing::debug!(username, cascaded = cascade.total(), "role change cascade applied");
        }
        self.refresh_session(&username);
        let nama = self.display_name(&username);
        self.audit(
            LogAction::Update,
            LogEntity::Users,
            format!("Updated user: {nama} ({username})"),
        );
        self.store
            .user(&username)
            .cloned()
            .ok_or_else(|| CoreError::not_found("user", &username))
    }

    pub fn update_user_photo(&mut self, username: &str, photo: &str) -> CoreResult<User> {
        check_image("photo", photo)?;
        let Some(existing) = self.store.user(username).cloned() else {
            return Err(CoreError::not_found("user", username));
        };
        let updated = User {
            photo: Some(photo.to_string()),
            ..existing
        };
        self.store.update_user(updated.clone())?;
        self.refresh_session(username);
        self.audit(
            LogAction::Update,
            LogEntity::Profile,
            format!("Updated profile photo for {username}."),
        );
        Ok(updated)
    }

    pub fn delete_user(&mut self, username: &str) -> CoreResult<User> {
        if self.session.as_ref().map(|u| u.username.as_str()) == Some(username) {
            return Err(CoreError::validation("cannot delete the signed-in account"));
        }
        let before = self.store.clone();
        let (removed, cascade) = self.store.delete_user(username)?;
        self.drop_signatory(username, before)?;
        tracing::debug!(username, cascaded = cascade.total(), "user cascade applied");
        self.audit(
            LogAction::Delete,
            LogEntity::Users,
            format!("Deleted user: {} ({})", removed.nama, removed.username),
        );
        Ok(removed)
    }

    // ---- classes ----

    pub fn add_class(&mut self, new: NewKelas) -> CoreResult<Kelas> {
        let row = self.store.insert_class(new)?;
        self.audit(
            LogAction::Create,
            LogEntity::Classes,
            format!("Added class: {}", row.kelas),
        );
        Ok(row)
    }

    pub fn update_class(&mut self, row: Kelas) -> CoreResult<Kelas> {
        self.store.update_class(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Classes,
            format!("Updated class: {}", row.kelas.trim()),
        );
        Ok(self.store.class(row.id).cloned().unwrap_or(row))
    }

    pub fn delete_class(&mut self, id: i64) -> CoreResult<Kelas> {
        let (removed, cascade) = self.store.delete_class(id)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Classes,
            format!(
                "Deleted class: {} ({} student(s) unassigned)",
                removed.kelas,
                cascade.total()
            ),
        );
        Ok(removed)
    }

    // ---- sanctions ----

    pub fn add_sanction(&mut self, new: NewSanksi) -> CoreResult<Sanksi> {
        let row = self.store.insert_sanction(new)?;
        self.audit(
            LogAction::Create,
            LogEntity::Sanctions,
            format!("Added sanction: {}", row.desk_kesalahan),
        );
        Ok(row)
    }

    pub fn update_sanction(&mut self, row: Sanksi) -> CoreResult<Sanksi> {
        self.store.update_sanction(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Sanctions,
            format!("Updated sanction: {}", row.desk_kesalahan.trim()),
        );
        Ok(self.store.sanction(row.id).cloned().unwrap_or(row))
    }

    pub fn delete_sanction(&mut self, id: i64) -> CoreResult<Sanksi> {
        let (removed, cascade) = self.store.delete_sanction(id)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Sanctions,
            format!(
                "Deleted sanction: {} ({} violation record(s) removed)",
                removed.desk_kesalahan,
                cascade.total()
            ),
        );
        Ok(removed)
    }

    // ---- remediation catalog ----

    pub fn add_remediation(&mut self, new: NewIntrospeksi) -> CoreResult<Introspeksi> {
        let row = self.store.insert_remediation(new)?;
        self.audit(
            LogAction::Create,
            LogEntity::Remediation,
            format!("Added remediation entry: {}", row.desk_perbaikan),
        );
        Ok(row)
    }

    pub fn update_remediation(&mut self, row: Introspeksi) -> CoreResult<Introspeksi> {
        self.store.update_remediation(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Remediation,
            format!("Updated remediation entry: {}", row.desk_perbaikan.trim()),
        );
        Ok(self.store.remediation_entry(row.id).cloned().unwrap_or(row))
    }

    pub fn delete_remediation(&mut self, id: i64) -> CoreResult<Introspeksi> {
        let (removed, cascade) = self.store.delete_remediation(id)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Remediation,
            format!(
                "Deleted remediation entry: {} ({} guidance record(s) removed)",
                removed.desk_perbaikan,
                cascade.total()
            ),
        );
        Ok(removed)
    }

    // ---- student class assignments ----

    fn class_label(&self, id_kelas: Option<i64>) -> String {
        id_kelas
            .and_then(|id| self.store.class(id))
            .map(|k| k.kelas.clone())
            .unwrap_or_else(|| "no class".to_string())
    }

    pub fn add_assignment(&mut self, row: Siswa) -> CoreResult<Siswa> {
        let row = self.store.insert_assignment(row)?;
        self.audit(
            LogAction::Create,
            LogEntity::Students,
            format!(
                "Assigned {} to {}",
                self.display_name(&row.nipd),
                self.class_label(row.id_kelas)
            ),
        );
        Ok(row)
    }

    pub fn update_assignment(&mut self, row: Siswa) -> CoreResult<Siswa> {
        self.store.update_assignment(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Students,
            format!(
                "Moved {} to {}",
                self.display_name(&row.nipd),
                self.class_label(row.id_kelas)
            ),
        );
        Ok(row)
    }

    pub fn delete_assignment(&mut self, nipd: &str) -> CoreResult<Siswa> {
        let removed = self.store.delete_assignment(nipd)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Students,
            format!("Removed class assignment for {}", self.display_name(nipd)),
        );
        Ok(removed)
    }

    pub fn assign_students_bulk(&mut self, rows: &[BulkRow<AssignmentRow>]) -> BulkOutcome {
        let outcome = self.store.assign_students_bulk(rows);
        self.audit(
            LogAction::Import,
            LogEntity::Students,
            format!(
                "Imported {} class assignment(s), {} row(s) failed.",
                outcome.success_count,
                outcome.errors.len()
            ),
        );
        outcome
    }

    // ---- violation and guidance records ----

    pub fn add_violation(&mut self, new: NewPelanggaran) -> CoreResult<Pelanggaran> {
        let row = self.store.insert_violation(new)?;
        self.audit(
            LogAction::Create,
            LogEntity::Violations,
            format!("Added violation for: {}", self.display_name(&row.nipd)),
        );
        Ok(row)
    }

    pub fn update_violation(&mut self, row: Pelanggaran) -> CoreResult<Pelanggaran> {
        self.store.update_violation(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Violations,
            format!("Updated violation for: {}", self.display_name(&row.nipd)),
        );
        Ok(row)
    }

    pub fn delete_violation(&mut self, id: i64) -> CoreResult<Pelanggaran> {
        let removed = self.store.delete_violation(id)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Violations,
            format!("Deleted violation for: {}", self.display_name(&removed.nipd)),
        );
        Ok(removed)
    }

    pub fn add_guidance(&mut self, new: NewBimbingan) -> CoreResult<Bimbingan> {
        let row = self.store.insert_guidance(new)?;
        self.audit(
            LogAction::Create,
            LogEntity::Guidance,
            format!("Added guidance for: {}", self.display_name(&row.nipd)),
        );
        Ok(row)
    }

    pub fn update_guidance(&mut self, row: Bimbingan) -> CoreResult<Bimbingan> {
        self.store.update_guidance(row.clone())?;
        self.audit(
            LogAction::Update,
            LogEntity::Guidance,
            format!("Updated guidance for: {}", self.display_name(&row.nipd)),
        );
        Ok(row)
    }

    pub fn delete_guidance(&mut self, id: i64) -> CoreResult<Bimbingan> {
        let removed = self.store.delete_guidance(id)?;
        self.audit(
            LogAction::Delete,
            LogEntity::Guidance,
            format!("Deleted guidance for: {}", self.display_name(&removed.nipd)),
        );
        Ok(removed)
    }

    // ---- activity log ----

    pub fn list_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.log.query(filter)
    }

    /// Audit entry for a report rendered outside the daemon.
    pub fn record_export(&mut self, entity: LogEntity, details: &str) -> CoreResult<()> {
        let details = details.trim();
        if details.is_empty() {
            return Err(CoreError::validation("details must not be empty"));
        }
        self.audit(LogAction::Export, entity, details.to_string());
        Ok(())
    }

    // ---- settings ----

    fn validate_settings(store: &EntityStore, s: &AppSettings) -> CoreResult<()> {
        if s.app_name.trim().is_empty() {
            return Err(CoreError::validation("appName must not be empty"));
        }
        let t = s.point_thresholds;
        if t.aman < 0 || t.perhatian < 0 {
            return Err(CoreError::validation("point thresholds must be >= 0"));
        }
        if t.aman >= t.perhatian {
            return Err(CoreError::validation(format!(
                "pointThresholds.aman ({}) must be lower than perhatian ({})",
                t.aman, t.perhatian
            )));
        }
        if let Some(logo) = &s.app_logo {
            check_image("appLogo", logo)?;
        }
        if let Some(logo) = &s.kop_surat.logo {
            check_image("kopSurat.logo", logo)?;
        }
        if let Some(sig) = &s.sp_signatory_username {
            match store.user(sig) {
                Some(u) if u.role == Role::Teacher => {}
                _ => return Err(CoreError::not_found("teacher", sig)),
            }
        }
        Ok(())
    }

    fn save_settings(&mut self, next: AppSettings) -> CoreResult<()> {
        if let Some(local) = &self.local {
            local.save_settings(&next)?;
        }
        self.settings = next;
        Ok(())
    }

    pub fn update_settings(&mut self, next: AppSettings) -> CoreResult<AppSettings> {
        Self::validate_settings(&self.store, &next)?;
        self.save_settings(next)?;
        self.audit(
            LogAction::Update,
            LogEntity::Settings,
            "Updated application settings.".to_string(),
        );
        Ok(self.settings.clone())
    }

    // ---- aggregation ----

    pub fn student_summaries(&self, range: DateRange) -> Vec<calc::StudentSummary> {
        calc::student_summaries(&self.store, self.settings.point_thresholds, range)
    }

    pub fn student_report(&self, nipd: &str, range: DateRange) -> CoreResult<calc::StudentReport> {
        calc::student_report(&self.store, self.settings.point_thresholds, nipd, range)
    }

    pub fn unassigned_students(&self) -> Vec<&User> {
        calc::unassigned_students(&self.store)
    }

    pub fn class_violation_counts(&self, range: DateRange) -> Vec<calc::ClassCount> {
        calc::class_violation_counts(&self.store, range)
    }

    pub fn top_offenders(&self, range: DateRange) -> Vec<calc::Offender> {
        calc::top_offenders(&self.store, range, calc::TOP_OFFENDER_LIMIT)
    }

    pub fn most_common(&self, kind: RecordKind, range: DateRange) -> Option<calc::MostCommon> {
        calc::most_common(&self.store, kind, range)
    }

    pub fn dashboard(&self, today: NaiveDate, month: DateRange) -> calc::DashboardOverview {
        calc::dashboard_overview(&self.store, today, month)
    }

    // ---- backup ----

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.store.clone(),
            logs: self.log.to_vec(),
            settings: self.settings.clone(),
        }
    }

    /// Called before a bundle is written, so the delay precedes the file.
    pub fn simulate_backup_delay(&self) {
        self.pause(3, 2);
    }

    pub fn record_backup(&mut self, path: &Path) {
        self.audit(
            LogAction::Export,
            LogEntity::Settings,
            format!("Exported backup to {}", path.to_string_lossy()),
        );
    }

    /// Replaces every collection, the log and the settings with `snap` once
    /// the snapshot passes the store and settings rules. A session whose user
    /// is not in the snapshot ends.
    pub fn restore(&mut self, snap: Snapshot, source: &Path) -> CoreResult<()> {
        snap.store.check_integrity()?;
        Self::validate_settings(&snap.store, &snap.settings)?;
        if let Some(local) = &self.local {
            local.save_settings(&snap.settings)?;
        }
        let actor = self.actor();
        self.store = snap.store;
        self.log = ActivityLog::from_entries(snap.logs);
        self.settings = snap.settings;
        if let Some(name) = self.session.as_ref().map(|u| u.username.clone()) {
            if self.store.user(&name).is_some() {
                self.refresh_session(&name);
            } else {
                tracing::warn!(username = %name, "session user missing from backup, signing out");
                self.session = None;
                self.persist_session();
            }
        }
        self.audit_as(
            actor,
            LogAction::Import,
            LogEntity::Settings,
            format!("Restored backup from {}", source.to_string_lossy()),
        );
        Ok(())
    }
}
