
use serde_json::json;
use test_support::{
    create_history_db, insert_scan, request_err, request_ok, spawn_sidecar, temp_dir,
    write_roster_csv,
};

#[test]
fn trend_covers_only_the_requested_window() {
    let workspace = temp_dir("attendanced-trend");
    let conn = create_history_db(&workspace);
    // late on the first and last day of the default window
    insert_scan(&conn, "2024-01-04", "ม.1/1", "s1", "late", None, None);
    insert_scan(&conn, "2024-01-10", "ม.1/1", "s2", "late", None, None);
    // just outside the 7-day window
    insert_scan(&conn, "2024-01-03", "ม.1/1", "s3", "late", None, None);
    // inside the window but not late
    insert_scan(&conn, "2024-01-07", "ม.1/1", "s4", "ontime", None, None);
    drop(conn);
    write_roster_csv(&workspace, &[("1/1", 10)]);

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let snap = request_ok(&mut stdin, &mut reader, "2", "dashboard.snapshot", json!({}));
    let trend = snap["trend"].as_array().expect("trend");
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0]["date"], json!("2024-01-04"));
    assert_eq!(trend[1]["date"], json!("2024-01-10"));

    // a wider window picks up the older late day
    let wide = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dashboard.snapshot",
        json!({ "trendDays": 30 }),
    );
    let trend = wide["trend"].as_array().expect("trend");
    assert_eq!(trend.len(), 3);
    assert_eq!(trend[0]["date"], json!("2024-01-03"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "dashboard.snapshot",
        json!({ "trendDays": 0 }),
    );
    assert_eq!(code, "bad_params");

    // absurd window sizes are rejected instead of overflowing the date math
    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "dashboard.snapshot",
        json!({ "trendDays": 4_000_000_000u64 }),
    );
    assert_eq!(code, "bad_params");

    // and the daemon is still alive afterwards
    let snap = request_ok(&mut stdin, &mut reader, "6", "dashboard.snapshot", json!({}));
    assert_eq!(snap["empty"], json!(false));
}

#[test]
fn recent_scans_keep_latest_per_student_and_day() {
    let workspace = temp_dir("attendanced-recent");
    let conn = create_history_db(&workspace);
    for i in 0..7 {
        insert_scan(
            &conn,
            "2024-01-10",
            "ม.1/1",
            &format!("s{}", i),
            "ontime",
            None,
            Some(&format!("2024-01-10 08:{:02}:00", i)),
        );
    }
    // s0 scans again later in the day; only the later row may appear
    insert_scan(
        &conn,
        "2024-01-10",
        "ม.1/1",
        "s0",
        "late",
        None,
        Some("2024-01-10 09:00:00"),
    );
    drop(conn);
    write_roster_csv(&workspace, &[("1/1", 10)]);

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let snap = request_ok(&mut stdin, &mut reader, "2", "dashboard.snapshot", json!({}));
    let recent = snap["recent"].as_array().expect("recent");
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0]["studentId"], json!("s0"));
    assert_eq!(recent[0]["status"], json!("late"));
    let mut seen = std::collections::HashSet::new();
    for row in recent {
        let key = (
            row["studentId"].as_str().expect("studentId").to_string(),
            row["date"].as_str().expect("date").to_string(),
        );
        assert!(seen.insert(key), "duplicate (student, date) in recent rows");
    }

    let trimmed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dashboard.snapshot",
        json!({ "recentLimit": 3 }),
    );
    assert_eq!(trimmed["recent"].as_array().expect("recent").len(), 3);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "dashboard.snapshot",
        json!({ "recentLimit": 4_000_000_000u64 }),
    );
    assert_eq!(code, "bad_params");
}
