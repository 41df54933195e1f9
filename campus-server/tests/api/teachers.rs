use campus_server::api::v1::subjects::{CreateSubject, Subject};
use campus_server::api::v1::teachers::{
    Assignment, CreateAssignment, CreateTeacher, Teacher, UpdateTeacher,
};

use crate::api::create_class;
use crate::{TestApp, TestUser};

async fn create_teacher(client: &crate::TestClient, name: &str, email: &str) -> Teacher {
    client
        .post(
            "/api/v1/teachers",
            CreateTeacher {
                name: name.to_string(),
                email: email.to_string(),
                phone: Some("+880-1812-000000".to_string()),
            },
        )
        .await
        .expect("failed to create teacher")
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn administrator_manages_teachers() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let teacher = create_teacher(&client, "R. Chowdhury", "r.chowdhury@campus.test").await;
    assert_eq!("R. Chowdhury", teacher.name);

    let all: Vec<Teacher> = client.get("/api/v1/teachers").await.unwrap();
    assert_eq!(1, all.len());

    let updated: Teacher = client
        .patch(
            &format!("/api/v1/teachers/{}", teacher.id.to_string()),
            UpdateTeacher {
                email: Some("rc@campus.test".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!("rc@campus.test", updated.email);

    client
        .delete_empty(&format!("/api/v1/teachers/{}", teacher.id.to_string()))
        .await
        .unwrap();

    let (status, _) = client
        .get_raw(&format!("/api/v1/teachers/{}", teacher.id.to_string()))
        .await
        .unwrap();
    assert_eq!(404, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn duplicate_teacher_emails_conflict() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_teacher(&client, "R. Chowdhury", "r.chowdhury@campus.test").await;

    let (status, _) = client
        .post_raw(
            "/api/v1/teachers",
            CreateTeacher {
                name: "Another Person".to_string(),
                email: "R.Chowdhury@campus.test".to_string(),
                phone: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(409, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn assignments_link_a_teacher_to_class_and_subject() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    let teacher = create_teacher(&client, "R. Chowdhury", "r.chowdhury@campus.test").await;
    let class = create_class(&client, "Grade4", "A").await;
    let subject: Subject = client
        .post(
            "/api/v1/subjects",
            CreateSubject {
                name: "Mathematics".to_string(),
            },
        )
        .await
        .unwrap();

    let assignments_path = format!("/api/v1/teachers/{}/assignments", teacher.id.to_string());

    let assignment: Assignment = client
        .post(
            &assignments_path,
            CreateAssignment {
                class_id: class.id,
                subject_id: subject.id,
            },
        )
        .await
        .unwrap();

    assert_eq!("Grade4", assignment.class);
    assert_eq!("A", assignment.section);
    assert_eq!("Mathematics", assignment.subject);
    assert_eq!(teacher.id.to_string(), assignment.teacher_id.to_string());

    let listed: Vec<Assignment> = client.get(&assignments_path).await.unwrap();
    assert_eq!(1, listed.len());

    client
        .delete_empty(&format!(
            "{}/{}",
            assignments_path,
            assignment.id.to_string()
        ))
        .await
        .unwrap();

    let listed: Vec<Assignment> = client.get(&assignments_path).await.unwrap();
    assert!(listed.is_empty());

    let (status, _) = client
        .delete_raw(&format!(
            "{}/{}",
            assignments_path,
            assignment.id.to_string()
        ))
        .await
        .unwrap();
    assert_eq!(404, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn the_same_assignment_cannot_be_created_twice() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;
    let teacher = create_teacher(&client, "R. Chowdhury", "r.chowdhury@campus.test").await;
    let class = create_class(&client, "Grade4", "A").await;
    let subject: Subject = client
        .post(
            "/api/v1/subjects",
            CreateSubject {
                name: "Mathematics".to_string(),
            },
        )
        .await
        .unwrap();

    let assignments_path = format!("/api/v1/teachers/{}/assignments", teacher.id.to_string());
    let request = CreateAssignment {
        class_id: class.id,
        subject_id: subject.id,
    };
    let _: Assignment = client.post(&assignments_path, &request).await.unwrap();

    let (status, _) = client.post_raw(&assignments_path, &request).await.unwrap();
    assert_eq!(409, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn assignments_for_an_unknown_teacher_are_not_found() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let bogus = campus_server::shortid::ShortId::new();
    let (status, _) = client
        .get_raw(&format!("/api/v1/teachers/{}/assignments", bogus.to_string()))
        .await
        .unwrap();

    assert_eq!(404, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn parents_read_teachers_but_cannot_change_them() {
    let (app, admin) = TestApp::start_and_connect(TestUser::Administrator).await;
    create_teacher(&admin, "R. Chowdhury", "r.chowdhury@campus.test").await;

    let parent = app.connect(TestUser::Parent).await.unwrap();
    let all: Vec<Teacher> = parent.get("/api/v1/teachers").await.unwrap();
    assert_eq!(1, all.len());

    let (status, _) = parent
        .post_raw(
            "/api/v1/teachers",
            CreateTeacher {
                name: "Imposter".to_string(),
                email: "imposter@campus.test".to_string(),
                phone: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(403, status);
}
