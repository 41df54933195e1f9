mod attendance;
mod health;
mod session;
mod subjects;
mod teachers;

use reqwest::multipart::{Form, Part};

use campus_server::api::v1::classes::{Class, CreateClass};
use campus_server::api::v1::students::Student;

use crate::TestClient;

pub const PHOTO_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a photo";
pub const CERTIFICATE_BYTES: &[u8] = b"%PDF-1.4 not really a certificate";

/// Password used for guardians created by student registration.
pub const PARENT_PASSWORD: &str = "a-long-enough-password";

pub async fn create_class(client: &TestClient, name: &str, section: &str) -> Class {
    client
        .post(
            "/api/v1/classes",
            CreateClass {
                name: name.to_string(),
                section: section.to_string(),
                tuition_fee: 1500,
                teacher_id: None,
            },
        )
        .await
        .expect("failed to create class")
}

/// A complete, valid registration form for the given class. Tests that
/// exercise validation pass the name of the one field to leave out.
pub fn registration_form_without(
    missing: &str,
    class: &str,
    section: &str,
    registration_number: &str,
    parent_username: &str,
) -> Form {
    let text_fields = [
        ("student_name", "Asha Rahman".to_string()),
        ("registration_number", registration_number.to_string()),
        ("date_of_birth", "2015-03-14".to_string()),
        ("gender", "Female".to_string()),
        ("country", "Bangladesh".to_string()),
        ("address", "12 Lake Road, Dhaka".to_string()),
        ("assigned_class", class.to_string()),
        ("assigned_section", section.to_string()),
        ("father_name", "Imran Rahman".to_string()),
        ("mother_name", "Nadia Rahman".to_string()),
        ("email", "asha@family.test".to_string()),
        ("phone", "+880-1711-000000".to_string()),
        ("username", parent_username.to_string()),
        ("password", PARENT_PASSWORD.to_string()),
    ];

    let mut form = Form::new();
    for (name, value) in text_fields {
        if name != missing {
            form = form.text(name, value);
        }
    }
    if missing != "student_photo" {
        form = form.part(
            "student_photo",
            Part::bytes(PHOTO_BYTES.to_vec()).file_name("asha.png"),
        );
    }
    if missing != "birth_certificate" {
        form = form.part(
            "birth_certificate",
            Part::bytes(CERTIFICATE_BYTES.to_vec()).file_name("asha-certificate.pdf"),
        );
    }
    form
}

pub fn registration_form(
    class: &str,
    section: &str,
    registration_number: &str,
    parent_username: &str,
) -> Form {
    registration_form_without("", class, section, registration_number, parent_username)
}

pub async fn register_student(
    client: &TestClient,
    class: &str,
    section: &str,
    registration_number: &str,
    parent_username: &str,
) -> Student {
    client
        .post_multipart(
            "/api/v1/students",
            registration_form(class, section, registration_number, parent_username),
        )
        .await
        .expect("failed to register student")
}
