use campus_server::api::v1::subjects::{CreateSubject, Subject, UpdateSubject};

use crate::{TestApp, TestUser};

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn administrator_manages_subjects() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let subject: Subject = client
        .post(
            "/api/v1/subjects",
            CreateSubject {
                name: "Mathematics".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!("Mathematics", subject.name);

    let renamed: Subject = client
        .patch(
            &format!("/api/v1/subjects/{}", subject.id.to_string()),
            UpdateSubject {
                name: Some("Applied Mathematics".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!("Applied Mathematics", renamed.name);

    client
        .delete_empty(&format!("/api/v1/subjects/{}", subject.id.to_string()))
        .await
        .unwrap();

    // deleting again reports what is no longer there
    let (status, body) = client
        .delete_raw(&format!("/api/v1/subjects/{}", subject.id.to_string()))
        .await
        .unwrap();
    assert_eq!(404, status);
    assert_eq!(
        format!("subject with ID {} does not exist", subject.id.to_string()),
        body["message"]
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn subjects_are_listed_alphabetically() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    for name in ["Physics", "art", "Biology"] {
        let _: Subject = client
            .post(
                "/api/v1/subjects",
                CreateSubject {
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
    }

    let all: Vec<Subject> = client.get("/api/v1/subjects").await.unwrap();
    let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(vec!["art", "Biology", "Physics"], names);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn duplicate_subject_names_conflict() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Administrator).await;

    let request = CreateSubject {
        name: "Mathematics".to_string(),
    };
    let _: Subject = client.post("/api/v1/subjects", &request).await.unwrap();

    let (status, _) = client.post_raw("/api/v1/subjects", &request).await.unwrap();
    assert_eq!(409, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn parents_read_subjects_but_cannot_change_them() {
    let (app, admin) = TestApp::start_and_connect(TestUser::Administrator).await;
    let _: Subject = admin
        .post(
            "/api/v1/subjects",
            CreateSubject {
                name: "Mathematics".to_string(),
            },
        )
        .await
        .unwrap();

    let parent = app.connect(TestUser::Parent).await.unwrap();
    let all: Vec<Subject> = parent.get("/api/v1/subjects").await.unwrap();
    assert_eq!(1, all.len());

    let (status, _) = parent
        .post_raw(
            "/api/v1/subjects",
            CreateSubject {
                name: "Chemistry".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(403, status);
}
