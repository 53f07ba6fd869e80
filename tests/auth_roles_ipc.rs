use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_disiplind");
    let mut child = Command::new(exe)
        .args(["--seed", "demo", "--simulated-latency-ms", "0"])
        .env_remove("DISIPLIND_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn disiplind");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn login(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, username: &str) {
    let resp = request(
        stdin,
        reader,
        "login",
        "auth.login",
        json!({ "username": username, "password": "password" }),
    );
    assert_eq!(resp["ok"], true, "login {} failed: {}", username, resp);
}

#[test]
fn requests_without_a_session_are_unauthenticated() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(&mut stdin, &mut reader, "1", "violations.list", json!({}));
    assert_eq!(error_code(&resp), Some("unauthenticated"));
    let resp = request(&mut stdin, &mut reader, "2", "settings.get", json!({}));
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["result"]["settings"]["appName"], "DisciplineApp");

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "username": "superadmin", "password": "wrong" }),
    );
    assert_eq!(error_code(&resp), Some("invalid_credentials"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.resetPasswordRequest",
        json!({ "emailOrUsername": "someone@example.org" }),
    );
    assert_eq!(resp["result"]["accepted"], true);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn students_only_see_their_own_records() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login(&mut stdin, &mut reader, "0012345678");

    let own = request(
        &mut stdin,
        &mut reader,
        "1",
        "analytics.studentReport",
        json!({ "nipd": "0012345678" }),
    );
    assert_eq!(own["ok"], true, "{}", own);
    assert_eq!(own["result"]["report"]["nama"], "Jane Smith");

    let other = request(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.studentReport",
        json!({ "nipd": "0023456789" }),
    );
    assert_eq!(error_code(&other), Some("forbidden"));

    let all = request(&mut stdin, &mut reader, "3", "violations.list", json!({}));
    assert_eq!(error_code(&all), Some("forbidden"));
    let mine = request(
        &mut stdin,
        &mut reader,
        "4",
        "violations.list",
        json!({ "nipd": "0012345678" }),
    );
    assert_eq!(mine["ok"], true);
    let rows = mine["result"]["violations"].as_array().cloned().unwrap_or_default();
    assert!(rows.iter().all(|r| r["nipd"] == "0012345678"));

    let rename = request(
        &mut stdin,
        &mut reader,
        "5",
        "users.update",
        json!({ "user": {
            "username": "0012345678",
            "nama": "Jane A. Smith",
            "jenis_kelamin": "perempuan",
            "role": "admin"
        }}),
    );
    assert_eq!(rename["ok"], true, "{}", rename);
    assert_eq!(rename["result"]["user"]["nama"], "Jane A. Smith");
    assert_eq!(rename["result"]["user"]["role"], "siswa");

    let pw = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.changePassword",
        json!({ "currentPassword": "password", "newPassword": "s3cret" }),
    );
    assert_eq!(pw["ok"], true);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn teachers_read_and_discipline_staff_write() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login(&mut stdin, &mut reader, "199001012020121001");

    let list = request(&mut stdin, &mut reader, "1", "sanctions.list", json!({}));
    assert_eq!(list["ok"], true);
    let create = request(
        &mut stdin,
        &mut reader,
        "2",
        "violations.create",
        json!({ "violation": { "nipd": "0012345678", "id_sanksi": 1, "tanggal": "2024-09-02" } }),
    );
    assert_eq!(error_code(&create), Some("forbidden"));

    let _ = request(&mut stdin, &mut reader, "3", "auth.logout", json!({}));
    login(&mut stdin, &mut reader, "tds");

    let create = request(
        &mut stdin,
        &mut reader,
        "4",
        "violations.create",
        json!({ "violation": { "nipd": "0012345678", "id_sanksi": 1, "tanggal": "2024-09-02" } }),
    );
    assert_eq!(create["ok"], true, "{}", create);
    assert_eq!(create["result"]["violation"]["id"], 41);

    let users = request(
        &mut stdin,
        &mut reader,
        "5",
        "users.delete",
        json!({ "username": "0012345678" }),
    );
    assert_eq!(error_code(&users), Some("forbidden"));
    let logs = request(&mut stdin, &mut reader, "6", "logs.list", json!({}));
    assert_eq!(error_code(&logs), Some("forbidden"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn admins_manage_users_and_see_the_log() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login(&mut stdin, &mut reader, "admin");

    let created = request(
        &mut stdin,
        &mut reader,
        "1",
        "users.create",
        json!({ "user": {
            "username": "0100000001",
            "nama": "Rudi Hartono",
            "jenis_kelamin": "laki-laki",
            "role": "siswa"
        }}),
    );
    assert_eq!(created["ok"], true, "{}", created);
    let dup = request(
        &mut stdin,
        &mut reader,
        "2",
        "users.create",
        json!({ "user": {
            "username": "0100000001",
            "nama": "Someone Else",
            "jenis_kelamin": "laki-laki",
            "role": "siswa"
        }}),
    );
    assert_eq!(error_code(&dup), Some("duplicate_key"));
    assert_eq!(dup["error"]["details"]["key"], "0100000001");

    let selfdel = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.delete",
        json!({ "username": "admin" }),
    );
    assert_eq!(error_code(&selfdel), Some("bad_params"));

    let logs = request(
        &mut stdin,
        &mut reader,
        "4",
        "logs.list",
        json!({ "entity": "users", "username": "admin" }),
    );
    assert_eq!(logs["ok"], true);
    let entries = logs["result"]["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[0]["details"], "Added user: Rudi Hartono (0100000001)");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn profile_photos_are_validated_and_can_be_cleared() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login(&mut stdin, &mut reader, "admin");
    let jane = |photo: serde_json::Value| {
        json!({ "user": {
            "username": "0012345678",
            "nama": "Jane Smith",
            "jenis_kelamin": "perempuan",
            "role": "siswa",
            "photo": photo
        }})
    };

    let set = request(
        &mut stdin,
        &mut reader,
        "1",
        "users.updatePhoto",
        json!({ "username": "0012345678", "photo": "data:image/png;base64,AAAA" }),
    );
    assert_eq!(set["result"]["user"]["photo"], "data:image/png;base64,AAAA");

    let bad = request(
        &mut stdin,
        &mut reader,
        "2",
        "users.update",
        jane(json!("https://example.com/me.png")),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));

    let cleared = request(&mut stdin, &mut reader, "3", "users.update", jane(json!(null)));
    assert_eq!(cleared["ok"], true, "{}", cleared);
    assert!(cleared["result"]["user"].get("photo").is_none());

    drop(stdin);
    let _ = child.wait();
}
