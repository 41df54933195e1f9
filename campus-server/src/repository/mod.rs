use miette::Diagnostic;
use thiserror::Error;

use crate::database::Database;

pub mod attendance;
pub mod class;
pub mod fee;
pub mod student;
pub mod subject;
pub mod teacher;
pub mod user;

type Result<T> = std::result::Result<T, RepositoryError>;

const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryError {
    #[error("invalid argument {0}: {1}")]
    #[diagnostic(code(campus::error::invalid_argument))]
    InvalidArgument(String, String),
    #[error("query failed: {0}")]
    #[diagnostic(code(campus::error::database))]
    DatabaseError(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    #[diagnostic(code(campus::error::password))]
    PasswordHashError(#[from] bcrypt::BcryptError),
    #[error("{entity_type} {id} not found")]
    #[diagnostic(code(campus::error::not_found))]
    NotFound { entity_type: String, id: String },
}

impl RepositoryError {
    pub fn is_unique_constraint_violation(&self) -> bool {
        if let RepositoryError::DatabaseError(sqlx::Error::Database(e)) = self {
            if let Some(code) = e.code() {
                return code == PG_UNIQUE_VIOLATION;
            }
        }
        false
    }
}

#[derive(Clone)]
pub struct Repository {
    attendance: attendance::AttendanceRepository,
    class: class::ClassRepository,
    fee: fee::FeeRepository,
    student: student::StudentRepository,
    subject: subject::SubjectRepository,
    teacher: teacher::TeacherRepository,
    user: user::UserRepository,
}

impl Repository {
    pub fn new(database: Database) -> Self {
        Self {
            attendance: attendance::AttendanceRepository::new(database.clone()),
            class: class::ClassRepository::new(database.clone()),
            fee: fee::FeeRepository::new(database.clone()),
            student: student::StudentRepository::new(database.clone()),
            subject: subject::SubjectRepository::new(database.clone()),
            teacher: teacher::TeacherRepository::new(database.clone()),
            user: user::UserRepository::new(database),
        }
    }

    pub fn attendance(&self) -> &attendance::AttendanceRepository {
        &self.attendance
    }

    pub fn class(&self) -> &class::ClassRepository {
        &self.class
    }

    pub fn fee(&self) -> &fee::FeeRepository {
        &self.fee
    }

    pub fn student(&self) -> &student::StudentRepository {
        &self.student
    }

    pub fn subject(&self) -> &subject::SubjectRepository {
        &self.subject
    }

    pub fn teacher(&self) -> &teacher::TeacherRepository {
        &self.teacher
    }

    pub fn user(&self) -> &user::UserRepository {
        &self.user
    }
}
