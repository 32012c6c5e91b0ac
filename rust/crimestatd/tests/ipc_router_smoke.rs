use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_crimestatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn crimestatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_response(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
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

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn result_i64(resp: &serde_json::Value, key: &str) -> i64 {
    resp["result"][key]
        .as_i64()
        .unwrap_or_else(|| panic!("missing result.{key} in {resp}"))
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("crimestat-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let data_dir = temp_dir("crimestat-router-smoke-data");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert!(health["result"]["workspacePath"].is_null());

    let early = request(&mut stdin, &mut reader, "2", "states.list", json!({}));
    assert_eq!(error_code(&early), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], json!(true));

    let seeded = request(&mut stdin, &mut reader, "4", "states.seedDefaults", json!({}));
    assert_eq!(result_i64(&seeded, "added"), 8);
    let act = request(
        &mut stdin,
        &mut reader,
        "5",
        "states.get",
        json!({ "abbreviatedName": "act" }),
    );
    let act_id = act["result"]["state"]["id"].as_i64().expect("ACT id");
    let _ = request(&mut stdin, &mut reader, "6", "states.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "states.update",
        json!({ "id": act_id, "abbreviatedName": "ACT", "name": "Australian Capital Territory" }),
    );

    let lga = request(
        &mut stdin,
        &mut reader,
        "8",
        "lgas.create",
        json!({ "name": "Belconnen", "stateId": act_id }),
    );
    let lga_id = result_i64(&lga, "id");
    let _ = request(&mut stdin, &mut reader, "9", "lgas.get", json!({ "id": lga_id }));
    let _ = request(&mut stdin, &mut reader, "10", "lgas.list", json!({}));
    let by_state = request(
        &mut stdin,
        &mut reader,
        "11",
        "lgas.byState",
        json!({ "stateId": act_id }),
    );
    assert_eq!(
        by_state["result"]["localGovernmentAreas"]
            .as_array()
            .map(|a| a.len()),
        Some(1)
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "lgas.update",
        json!({ "id": lga_id, "name": "Belconnen", "stateId": act_id }),
    );

    let category = request(
        &mut stdin,
        &mut reader,
        "13",
        "offenceCategories.create",
        json!({ "name": "Property" }),
    );
    let category_id = result_i64(&category, "id");
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "offenceCategories.get",
        json!({ "id": category_id }),
    );
    let _ = request(&mut stdin, &mut reader, "15", "offenceCategories.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "offenceCategories.update",
        json!({ "id": category_id, "name": "Property crime" }),
    );

    let offence = request(
        &mut stdin,
        &mut reader,
        "17",
        "offences.create",
        json!({ "name": "Burglary", "offenceCategoryId": category_id }),
    );
    let offence_id = result_i64(&offence, "id");
    let _ = request(&mut stdin, &mut reader, "18", "offences.get", json!({ "id": offence_id }));
    let _ = request(&mut stdin, &mut reader, "19", "offences.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "offences.update",
        json!({ "id": offence_id, "name": "Burglary", "offenceCategoryId": category_id }),
    );

    let crime = request(
        &mut stdin,
        &mut reader,
        "21",
        "crimes.create",
        json!({
            "localGovernmentAreaId": lga_id,
            "offenceId": offence_id,
            "month": 1,
            "year": 2015,
            "count": 3
        }),
    );
    let crime_id = result_i64(&crime, "id");
    let got = request(&mut stdin, &mut reader, "22", "crimes.get", json!({ "id": crime_id }));
    assert_eq!(got["result"]["crime"]["count"], json!(3));
    let _ = request(&mut stdin, &mut reader, "23", "crimes.list", json!({ "year": 2015 }));
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "crimes.update",
        json!({
            "id": crime_id,
            "localGovernmentAreaId": lga_id,
            "offenceId": offence_id,
            "month": 1,
            "year": 2015,
            "count": 4
        }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "settings.set",
        json!({ "key": "import.batchSize", "value": 500 }),
    );
    let setting = request(
        &mut stdin,
        &mut reader,
        "26",
        "settings.get",
        json!({ "key": "import.batchSize" }),
    );
    assert_eq!(setting["result"]["value"], json!(500));

    let _ = request(&mut stdin, &mut reader, "27", "import.states", json!({}));
    let run = request(
        &mut stdin,
        &mut reader,
        "28",
        "import.run",
        json!({ "dataSourceDirectory": data_dir.to_string_lossy() }),
    );
    assert_eq!(run["result"]["states"][0]["status"], json!("skipped"));
    let _ = request(&mut stdin, &mut reader, "29", "import.runs.list", json!({}));

    let export = request(
        &mut stdin,
        &mut reader,
        "30",
        "backup.exportWorkspaceBundle",
        json!({
            "workspacePath": workspace.to_string_lossy(),
            "outPath": bundle_out.to_string_lossy()
        }),
    );
    assert_eq!(export["ok"], json!(true));
    let restored = request(
        &mut stdin,
        &mut reader,
        "31",
        "backup.importWorkspaceBundle",
        json!({
            "inPath": bundle_out.to_string_lossy(),
            "workspacePath": workspace.to_string_lossy()
        }),
    );
    assert_eq!(restored["ok"], json!(true));
    let after = request(&mut stdin, &mut reader, "32", "crimes.get", json!({ "id": crime_id }));
    assert_eq!(after["result"]["crime"]["count"], json!(4));

    let unknown = request_raw(&mut stdin, &mut reader, "33", "crimes.delete");
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write bad line");
    stdin.flush().expect("flush bad line");
    let bad = read_response(&mut reader);
    assert_eq!(error_code(&bad), Some("bad_json"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(data_dir);
}

fn request_raw(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", json!({ "id": id, "method": method })).expect("write request");
    stdin.flush().expect("flush request");
    read_response(reader)
}
