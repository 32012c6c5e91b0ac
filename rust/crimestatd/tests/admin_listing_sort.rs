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

struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_crimestatd"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn crimestatd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{}", json!({ "id": id, "method": method, "params": params }))
            .expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
        assert_eq!(value["id"], json!(id));
        value
    }

    fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let resp = self.call(method, params);
        assert_eq!(resp["ok"], json!(true), "{method} failed: {resp}");
        resp["result"].clone()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        self.stdin.take();
        let _ = self.child.wait();
    }
}

fn names(page: &serde_json::Value, field: &str) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|i| i[field].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn states_sort_by_column_and_direction() {
    let workspace = temp_dir("crimestat-listing-states");
    let mut s = Sidecar::spawn();
    s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
    s.ok("states.seedDefaults", json!({}));

    let default_order = s.ok("states.list", json!({}));
    assert_eq!(
        names(&default_order, "abbreviatedName"),
        ["ACT", "NSW", "NT", "QLD", "SA", "TAS", "VIC", "WA"]
    );

    let desc = s.ok(
        "states.list",
        json!({ "sortBy": "Name", "sortDirection": "Descending" }),
    );
    assert_eq!(names(&desc, "name")[0], "Western Australia");
    assert_eq!(names(&desc, "name")[7], "Australian Capital Territory");

    // Direction without a column, or an unknown column, keeps id order.
    let no_column = s.ok("states.list", json!({ "sortDirection": "Descending" }));
    assert_eq!(names(&no_column, "abbreviatedName")[0], "ACT");
    let unknown = s.ok(
        "states.list",
        json!({ "sortBy": "Population", "sortDirection": "Descending" }),
    );
    assert_eq!(names(&unknown, "abbreviatedName")[0], "ACT");

    let paged = s.ok(
        "states.list",
        json!({ "sortBy": "AbbreviatedName", "sortDirection": "Descending", "page": 2, "pageSize": 3 }),
    );
    assert_eq!(names(&paged, "abbreviatedName"), ["SA", "QLD", "NT"]);
    assert_eq!(paged["total"], json!(8));
    assert_eq!(paged["pageCount"], json!(3));

    let bad = s.call("states.list", json!({ "pageSize": 0 }));
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn areas_sort_by_state_name_then_name() {
    let workspace = temp_dir("crimestat-listing-areas");
    let mut s = Sidecar::spawn();
    s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
    s.ok("states.seedDefaults", json!({}));
    let act = s.ok("states.get", json!({ "abbreviatedName": "ACT" }))["state"]["id"].clone();
    let vic = s.ok("states.get", json!({ "abbreviatedName": "VIC" }))["state"]["id"].clone();

    for (name, state_id) in [
        ("Yarra", &vic),
        ("Gungahlin", &act),
        ("Ballarat", &vic),
        ("Belconnen", &act),
    ] {
        s.ok("lgas.create", json!({ "name": name, "stateId": state_id }));
    }

    let by_state = s.ok(
        "lgas.list",
        json!({ "sortBy": "StateName", "sortDirection": "Descending" }),
    );
    assert_eq!(
        names(&by_state, "name"),
        ["Ballarat", "Yarra", "Belconnen", "Gungahlin"]
    );
    assert_eq!(by_state["items"][0]["stateName"], json!("Victoria"));

    let by_name = s.ok(
        "lgas.list",
        json!({ "sortBy": "Name", "sortDirection": "Ascending" }),
    );
    assert_eq!(
        names(&by_name, "name"),
        ["Ballarat", "Belconnen", "Gungahlin", "Yarra"]
    );

    let missing_state = s.call("lgas.create", json!({ "name": "Nowhere", "stateId": 999 }));
    assert_eq!(missing_state["error"]["code"], json!("bad_params"));

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn offence_updates_follow_form_rules() {
    let workspace = temp_dir("crimestat-listing-offences");
    let mut s = Sidecar::spawn();
    s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));

    let id = s.ok("offences.create", json!({ "name": "Burglary" }))["id"].clone();
    let dup = s.call("offences.create", json!({ "name": "BURGLARY" }));
    assert_eq!(dup["error"]["code"], json!("conflict"));

    let ignored = s.ok(
        "offences.update",
        json!({ "id": id, "name": "Renamed", "isDelete": true }),
    );
    assert_eq!(ignored["updated"], json!(false));
    let got = s.ok("offences.get", json!({ "id": id }));
    assert_eq!(got["offence"]["name"], json!("Burglary"));

    let hidden = s.ok(
        "offences.update",
        json!({ "id": id, "name": "Burglary", "isDeleted": true }),
    );
    assert_eq!(hidden["updated"], json!(true));
    let listed = s.ok(
        "offences.list",
        json!({ "sortBy": "IsDeleted", "sortDirection": "Descending" }),
    );
    assert_eq!(listed["items"][0]["isDeleted"], json!(true));

    let missing = s.call("offences.update", json!({ "id": 999, "name": "Arson" }));
    assert_eq!(missing["error"]["code"], json!("not_found"));

    let bad_category = s.call(
        "offences.create",
        json!({ "name": "Arson", "offenceCategoryId": 42 }),
    );
    assert_eq!(bad_category["error"]["code"], json!("bad_params"));

    drop(s);
    let _ = std::fs::remove_dir_all(workspace);
}
