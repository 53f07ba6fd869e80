use chrono::{Duration, NaiveDate};

use crate::config::SeedKind;
use crate::errors::CoreResult;
use crate::model::{
    Gender, JenisPerbaikan, JenisSanksi, NewBimbingan, NewIntrospeksi, NewKelas, NewPelanggaran,
    NewSanksi, Role, Siswa, Tingkat, User,
};
use crate::store::EntityStore;

const SUPERADMIN: (&str, &str, Gender) = ("superadmin", "Super Admin", Gender::Male);

const STAFF: &[(&str, &str, Gender, Role)] = &[
    ("admin", "Admin Utama", Gender::Female, Role::Admin),
    ("admin02", "Admin Cadangan", Gender::Male, Role::Admin),
    ("admin03", "Admin Sistem", Gender::Female, Role::Admin),
    ("tds", "Tim Disiplin Siswa", Gender::Male, Role::DisciplineStaff),
    ("199001012020121001", "Dr. John Doe", Gender::Male, Role::Teacher),
    ("198505102015032002", "Siti Aminah, S.Pd.", Gender::Female, Role::Teacher),
    ("199208152018011003", "Budi Hartono, M.Kom.", Gender::Male, Role::Teacher),
    ("198811202017062004", "Dewi Lestari, S.S.", Gender::Female, Role::Teacher),
    ("199503252019021005", "Agus Santoso, S.T.", Gender::Male, Role::Teacher),
    ("198007122010102006", "Rina Marlina, M.Pd.", Gender::Female, Role::Teacher),
    ("199309012021011007", "Eko Prasetyo, S.Kom.", Gender::Male, Role::Teacher),
    ("198704182016052008", "Fitri Handayani, S.Psi.", Gender::Female, Role::Teacher),
];

const STUDENTS: &[(&str, &str, Gender)] = &[
    ("0012345678", "Jane Smith", Gender::Female),
    ("0023456789", "Ahmad Faisal", Gender::Male),
    ("0034567890", "Citra Kirana", Gender::Female),
    ("0045678901", "Doni Saputra", Gender::Male),
    ("0056789012", "Eka Putri", Gender::Female),
    ("0067890123", "Fajar Nugraha", Gender::Male),
    ("0078901234", "Gita Amelia", Gender::Female),
    ("0089012345", "Hendra Wijaya", Gender::Male),
    ("0090123456", "Indah Permata", Gender::Female),
    ("0090123457", "Joko Susilo", Gender::Male),
    ("0090123458", "Kartika Sari", Gender::Female),
    ("0090123459", "Leo Wijaya", Gender::Male),
    ("0090123460", "Maya Dewi", Gender::Female),
    ("0090123461", "Naufal Zaki", Gender::Male),
    ("0090123462", "Olivia Putri", Gender::Female),
    ("0090123463", "Putra Perkasa", Gender::Male),
    ("0090123464", "Qonita Aulia", Gender::Female),
    ("0090123465", "Rizky Ananda", Gender::Male),
    ("0090123466", "Siska Amelia", Gender::Female),
    ("0090123467", "Taufik Hidayat", Gender::Male),
];

const CLASSES: &[(&str, Tingkat, Option<&str>)] = &[
    ("X IPA 1", Tingkat::X, Some("199001012020121001")),
    ("X IPA 2", Tingkat::X, Some("198505102015032002")),
    ("X IPS 1", Tingkat::X, None),
    ("XI IPA 1", Tingkat::XI, Some("199208152018011003")),
    ("XI IPS 1", Tingkat::XI, Some("198811202017062004")),
    ("XII IPA 1", Tingkat::XII, Some("199503252019021005")),
    ("XII IPA 2", Tingkat::XII, None),
    ("XII IPS 1", Tingkat::XII, Some("198007122010102006")),
];

const SANCTIONS: &[(&str, JenisSanksi, i64)] = &[
    ("Terlambat masuk sekolah", JenisSanksi::Ringan, 5),
    ("Tidak mengerjakan PR", JenisSanksi::Ringan, 10),
    ("Memakai seragam tidak lengkap", JenisSanksi::Ringan, 5),
    ("Membolos saat jam pelajaran", JenisSanksi::Sedang, 25),
    ("Merokok di area sekolah", JenisSanksi::Berat, 75),
    ("Tidak mengikuti upacara bendera", JenisSanksi::Sedang, 15),
    ("Berkelahi dengan siswa lain", JenisSanksi::Berat, 100),
    ("Mencoret-coret fasilitas sekolah", JenisSanksi::Sedang, 30),
];

const REMEDIATION: &[(&str, JenisPerbaikan, i64)] = &[
    ("Membersihkan papan tulis setelah digunakan", JenisPerbaikan::Mudah, 5),
    ("Membantu guru membawa buku ke ruang guru", JenisPerbaikan::Mudah, 10),
    ("Menjadi petugas upacara", JenisPerbaikan::Cukup, 20),
    ("Mengikuti lomba antar sekolah", JenisPerbaikan::Sulit, 50),
    ("Membuat rangkuman materi pelajaran", JenisPerbaikan::Cukup, 15),
    ("Menjuarai kompetisi tingkat nasional", JenisPerbaikan::Sulit, 100),
    ("Merawat tanaman di taman sekolah", JenisPerbaikan::Mudah, 5),
];

const ASSIGNED_STUDENTS: usize = 15;
const VIOLATION_RECORDS: usize = 40;
const GUIDANCE_RECORDS: usize = 25;
const HISTORY_DAYS: usize = 180;

/// Deterministic stand-in for picking a pseudo-random slot.
fn spread(i: usize, mul: usize, add: usize, modulo: usize) -> usize {
    (i * mul + add) % modulo
}

pub fn build(kind: SeedKind, today: NaiveDate) -> CoreResult<EntityStore> {
    match kind {
        SeedKind::Empty => Ok(EntityStore::new()),
        SeedKind::Bootstrap => bootstrap(),
        SeedKind::Demo => demo(today),
    }
}

fn bootstrap() -> CoreResult<EntityStore> {
    let mut store = EntityStore::new();
    let (username, nama, jenis_kelamin) = SUPERADMIN;
    store.insert_user(User {
        username: username.into(),
        nama: nama.into(),
        jenis_kelamin,
        role: Role::SuperAdmin,
        photo: None,
    })?;
    Ok(store)
}

/// The mock school: 33 accounts, 8 classes, both catalogs, 15 assigned
/// students and a half-year of records ending at `today`.
fn demo(today: NaiveDate) -> CoreResult<EntityStore> {
    let mut store = bootstrap()?;
    for (username, nama, jenis_kelamin, role) in STAFF {
        store.insert_user(User {
            username: (*username).into(),
            nama: (*nama).into(),
            jenis_kelamin: *jenis_kelamin,
            role: *role,
            photo: None,
        })?;
    }
    for (username, nama, jenis_kelamin) in STUDENTS {
        store.insert_user(User {
            username: (*username).into(),
            nama: (*nama).into(),
            jenis_kelamin: *jenis_kelamin,
            role: Role::Student,
            photo: None,
        })?;
    }
    for (kelas, tingkat, guru) in CLASSES {
        store.insert_class(NewKelas {
            kelas: (*kelas).into(),
            tingkat: *tingkat,
            id_guru: guru.map(str::to_string),
        })?;
    }
    for (desk, jenis, points) in SANCTIONS {
        store.insert_sanction(NewSanksi {
            desk_kesalahan: (*desk).into(),
            jenis_sanksi: *jenis,
            point_pelanggar: *points,
        })?;
    }
    for (desk, jenis, points) in REMEDIATION {
        store.insert_remediation(NewIntrospeksi {
            desk_perbaikan: (*desk).into(),
            jenis_perbaikan: *jenis,
            point_perbaikan: *points,
        })?;
    }

    // round-robin over the classes, the last five students stay unassigned
    let assigned: Vec<&str> = STUDENTS
        .iter()
        .take(ASSIGNED_STUDENTS)
        .map(|(nipd, _, _)| *nipd)
        .collect();
    for (i, nipd) in assigned.iter().enumerate() {
        store.insert_assignment(Siswa {
            nipd: (*nipd).into(),
            id_kelas: Some((i % CLASSES.len()) as i64 + 1),
        })?;
    }

    let days_ago = |n: usize| today - Duration::days(n as i64);
    for i in 0..VIOLATION_RECORDS {
        store.insert_violation(NewPelanggaran {
            nipd: assigned[spread(i, 7, 3, assigned.len())].into(),
            id_sanksi: spread(i, 5, 1, SANCTIONS.len()) as i64 + 1,
            tanggal: days_ago(spread(i, 37, 0, HISTORY_DAYS)),
        })?;
    }
    for i in 0..GUIDANCE_RECORDS {
        store.insert_guidance(NewBimbingan {
            nipd: assigned[spread(i, 4, 2, assigned.len())].into(),
            id_perbaikan: spread(i, 3, 0, REMEDIATION.len()) as i64 + 1,
            tanggal: days_ago(spread(i, 53, 1, HISTORY_DAYS)),
        })?;
    }
    Ok(store)
}
