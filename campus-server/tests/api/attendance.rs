use campus_server::api::v1::attendance::{AttendanceEntry, AttendanceOutcome, AttendanceRecord};
use campus_server::shortid::ShortId;

use crate::api::{create_class, register_student};
use crate::{TestApp, TestUser};

fn present(student_id: ShortId, date: &str) -> AttendanceRecord {
    AttendanceRecord {
        student_id,
        date: date.to_string(),
        class: "Grade4".to_string(),
        section: "A".to_string(),
        status: "Present".to_string(),
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn concurrent_identical_batches_never_duplicate_rows() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&client, "Grade4", "A").await;

    let mut batch = Vec::new();
    for (number, username) in [
        ("REG-1001", "parent.one"),
        ("REG-1002", "parent.two"),
        ("REG-1003", "parent.three"),
    ] {
        let student = register_student(&client, "Grade4", "A", number, username).await;
        batch.push(present(student.id, "2024-06-03"));
    }

    let (first, second) = tokio::join!(
        client.post::<&Vec<AttendanceRecord>, AttendanceOutcome>("/api/v1/attendance", &batch),
        client.post::<&Vec<AttendanceRecord>, AttendanceOutcome>("/api/v1/attendance", &batch),
    );
    let first = first.expect("first batch failed");
    let second = second.expect("second batch failed");

    // between the two submissions every entry was written exactly once
    assert_eq!(3, first.recorded + second.recorded);
    assert_eq!(3, first.duplicates + second.duplicates);

    let day: Vec<AttendanceEntry> = client
        .get("/api/v1/attendance?date=2024-06-03&class=Grade4&section=A")
        .await
        .unwrap();
    assert_eq!(3, day.len());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn marked_present_reads_back_present() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&client, "Grade4", "A").await;
    let student = register_student(&client, "Grade4", "A", "REG-1001", "asha.parent").await;

    let outcome: AttendanceOutcome = client
        .post(
            "/api/v1/attendance",
            vec![present(student.id, "2024-06-03")],
        )
        .await
        .unwrap();
    assert_eq!(1, outcome.recorded);
    assert_eq!(0, outcome.duplicates);

    let day: Vec<AttendanceEntry> = client
        .get("/api/v1/attendance?date=2024-06-03&class=Grade4&section=A")
        .await
        .unwrap();
    assert_eq!(1, day.len());
    assert_eq!(student.id.to_string(), day[0].student_id.to_string());
    assert_eq!("Asha Rahman", day[0].student_name);
    assert_eq!("Present", day[0].status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn absences_are_recorded_too() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&client, "Grade4", "A").await;
    let student = register_student(&client, "Grade4", "A", "REG-1001", "asha.parent").await;

    let mut record = present(student.id, "2024-06-03");
    record.status = "Absent".to_string();
    let _: AttendanceOutcome = client.post("/api/v1/attendance", vec![record]).await.unwrap();

    let day: Vec<AttendanceEntry> = client
        .get("/api/v1/attendance?date=2024-06-03&class=Grade4&section=A")
        .await
        .unwrap();
    assert_eq!("Absent", day[0].status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn an_unknown_student_rejects_the_whole_batch() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&client, "Grade4", "A").await;
    let student = register_student(&client, "Grade4", "A", "REG-1001", "asha.parent").await;

    let bogus = ShortId::new();
    let batch = vec![present(student.id, "2024-06-03"), present(bogus, "2024-06-03")];
    let (status, body) = client.post_raw("/api/v1/attendance", &batch).await.unwrap();

    assert_eq!(400, status);
    assert_eq!(
        format!(
            "invalid argument student_id: no student with ID {}",
            bogus.to_string()
        ),
        body["message"]
    );

    // nothing was written for the valid entry either
    let day: Vec<AttendanceEntry> = client
        .get("/api/v1/attendance?date=2024-06-03&class=Grade4&section=A")
        .await
        .unwrap();
    assert!(day.is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn a_status_other_than_present_or_absent_is_rejected() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&client, "Grade4", "A").await;
    let student = register_student(&client, "Grade4", "A", "REG-1001", "asha.parent").await;

    let mut record = present(student.id, "2024-06-03");
    record.status = "Late".to_string();
    let (status, body) = client
        .post_raw("/api/v1/attendance", vec![record])
        .await
        .unwrap();

    assert_eq!(400, status);
    assert_eq!("status must be Present or Absent, not Late", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn an_empty_batch_is_rejected() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let (status, body) = client
        .post_raw("/api/v1/attendance", Vec::<AttendanceRecord>::new())
        .await
        .unwrap();

    assert_eq!(400, status);
    assert_eq!("attendance batch is empty", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn teachers_can_record_attendance_but_parents_cannot() {
    let (app, admin) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_class(&admin, "Grade4", "A").await;
    let student = register_student(&admin, "Grade4", "A", "REG-1001", "asha.parent").await;

    let teacher = app.connect(TestUser::Teacher).await.unwrap();
    let outcome: AttendanceOutcome = teacher
        .post(
            "/api/v1/attendance",
            vec![present(student.id, "2024-06-03")],
        )
        .await
        .expect("teacher should be able to record attendance");
    assert_eq!(1, outcome.recorded);

    let parent = app.connect(TestUser::Parent).await.unwrap();
    let (status, _) = parent
        .post_raw(
            "/api/v1/attendance",
            vec![present(student.id, "2024-06-04")],
        )
        .await
        .unwrap();
    assert_eq!(403, status);

    let (status, _) = parent
        .get_raw("/api/v1/attendance?date=2024-06-03&class=Grade4&section=A")
        .await
        .unwrap();
    assert_eq!(403, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn reading_a_day_requires_all_three_parameters() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let (status, body) = client
        .get_raw("/api/v1/attendance?date=2024-06-03&class=Grade4")
        .await
        .unwrap();

    assert_eq!(400, status);
    assert_eq!("section is required", body["message"]);
}
