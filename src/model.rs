use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "superadmin")]
    SuperAdmin,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "tds")]
    DisciplineStaff,
    #[serde(rename = "guru")]
    Teacher,
    #[serde(rename = "siswa")]
    Student,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::DisciplineStaff,
        Role::Teacher,
        Role::Student,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "tds" => Some(Self::DisciplineStaff),
            "guru" => Some(Self::Teacher),
            "siswa" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "superadmin",
            Self::Admin => "admin",
            Self::DisciplineStaff => "tds",
            Self::Teacher => "guru",
            Self::Student => "siswa",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "laki-laki")]
    Male,
    #[serde(rename = "perempuan")]
    Female,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "laki-laki" => Some(Self::Male),
            "perempuan" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "laki-laki",
            Self::Female => "perempuan",
        }
    }
}

/// A dashboard account. `username` doubles as NIPD for students and NIP/NIK
/// for staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub nama: String,
    pub jenis_kelamin: Gender,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tingkat {
    X,
    XI,
    XII,
}

impl Tingkat {
    pub const ALL: [Tingkat; 3] = [Tingkat::X, Tingkat::XI, Tingkat::XII];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Some(Self::X),
            "XI" => Some(Self::XI),
            "XII" => Some(Self::XII),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kelas {
    pub id: i64,
    pub kelas: String,
    pub tingkat: Tingkat,
    pub id_guru: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKelas {
    pub kelas: String,
    pub tingkat: Tingkat,
    #[serde(default)]
    pub id_guru: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JenisSanksi {
    Ringan,
    Sedang,
    Berat,
}

impl JenisSanksi {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ringan => "Ringan",
            Self::Sedang => "Sedang",
            Self::Berat => "Berat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sanksi {
    pub id: i64,
    pub desk_kesalahan: String,
    pub jenis_sanksi: JenisSanksi,
    pub point_pelanggar: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSanksi {
    pub desk_kesalahan: String,
    pub jenis_sanksi: JenisSanksi,
    pub point_pelanggar: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JenisPerbaikan {
    Mudah,
    Cukup,
    Sulit,
}

impl JenisPerbaikan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mudah => "Mudah",
            Self::Cukup => "Cukup",
            Self::Sulit => "Sulit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introspeksi {
    pub id: i64,
    pub desk_perbaikan: String,
    pub jenis_perbaikan: JenisPerbaikan,
    pub point_perbaikan: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIntrospeksi {
    pub desk_perbaikan: String,
    pub jenis_perbaikan: JenisPerbaikan,
    pub point_perbaikan: i64,
}

/// Student-to-class assignment, keyed by the student's NIPD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Siswa {
    pub nipd: String,
    pub id_kelas: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pelanggaran {
    pub id: i64,
    pub nipd: String,
    pub id_sanksi: i64,
    pub tanggal: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPelanggaran {
    pub nipd: String,
    pub id_sanksi: i64,
    pub tanggal: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bimbingan {
    pub id: i64,
    pub nipd: String,
    pub id_perbaikan: i64,
    pub tanggal: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBimbingan {
    pub nipd: String,
    pub id_perbaikan: i64,
    pub tanggal: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Create,
    Import,
    Update,
    Delete,
    Export,
    Login,
    Logout,
}

impl LogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Import => "import",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogEntity {
    Users,
    Students,
    Classes,
    Sanctions,
    Remediation,
    Guidance,
    Violations,
    Profile,
    Settings,
    Auth,
    Reports,
}

impl LogEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Students => "students",
            Self::Classes => "classes",
            Self::Sanctions => "sanctions",
            Self::Remediation => "remediation",
            Self::Guidance => "guidance",
            Self::Violations => "violations",
            Self::Profile => "profile",
            Self::Settings => "settings",
            Self::Auth => "auth",
            Self::Reports => "reports",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: LogAction,
    pub entity: LogEntity,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointThresholds {
    pub aman: i64,
    pub perhatian: i64,
}

impl Default for PointThresholds {
    fn default() -> Self {
        Self {
            aman: 10,
            perhatian: 40,
        }
    }
}

/// Letterhead printed on generated letters and PDF reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KopSurat {
    pub logo: Option<String>,
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub line4: String,
    pub line5: String,
    pub line6: String,
    pub line7: String,
    pub line8: String,
}

/// Missing fields fall back to their defaults when deserializing, so a
/// partially saved settings object merges over the built-in values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub app_name: String,
    pub app_logo: Option<String>,
    pub point_thresholds: PointThresholds,
    pub kop_surat: KopSurat,
    pub sp_signatory_username: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "DisciplineApp".to_string(),
            app_logo: None,
            point_thresholds: PointThresholds::default(),
            kop_surat: KopSurat::default(),
            sp_signatory_username: None,
        }
    }
}
