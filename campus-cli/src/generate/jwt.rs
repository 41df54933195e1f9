use std::fs;

use argh::FromArgs;
use camino::Utf8PathBuf;
use campus_core::{
    auth::Role,
    jwt::{self, ACCESS_TOKEN_EXPIRY_MINUTES, DEFAULT_AUDIENCE, DEFAULT_ISSUER},
};

use crate::CliError;

/// Issue a JSON Web Token signed by a key in a given file.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "jwt")]
pub struct GenerateJwt {
    /// path to PEM file containing signing key
    #[argh(positional)]
    key_file_name: Utf8PathBuf,
    /// path to output JWT file
    #[argh(positional)]
    file_name: Utf8PathBuf,
    /// subject the JWT is issued for, e.g. a user's public ID
    #[argh(positional)]
    subject: String,
    /// name of issuer (default: campus.school/auth)
    #[argh(option, default = "DEFAULT_ISSUER.to_string()")]
    issuer: String,
    /// name of audience (default: campus.school/server)
    #[argh(option, default = "DEFAULT_AUDIENCE.to_string()")]
    audience: String,
    /// how long until the JWT expires, in minutes from now (default: 60)
    #[argh(option, default = "ACCESS_TOKEN_EXPIRY_MINUTES")]
    expiry_minutes: i64,
    /// role claim to include, repeatable (ADMINISTRATOR, TEACHER or PARENT)
    #[argh(option)]
    role: Vec<String>,
}

impl GenerateJwt {
    pub async fn run(&self) -> Result<(), CliError> {
        tracing::info!("issuing JWT signed by key in {}", self.key_file_name);

        let roles = if self.role.is_empty() {
            None
        } else {
            Some(
                self.role
                    .iter()
                    .map(|name| parse_role(name))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        let pem = fs::read(&self.key_file_name)?;
        let generator = jwt::Generator::new_from_pem(&pem, &self.issuer, &self.audience)
            .map_err(CliError::JWTJWKSGenerationError)?;

        let jwt = generator
            .generate(&self.subject, self.expiry_minutes, roles)
            .map_err(CliError::JWTJWKSGenerationError)?;

        tracing::info!("saving JWT to {}", self.file_name);
        fs::write(&self.file_name, jwt.as_bytes())?;

        Ok(())
    }
}

fn parse_role(name: &str) -> Result<Role, CliError> {
    match name.to_uppercase().as_str() {
        "ADMINISTRATOR" => Ok(Role::Administrator),
        "TEACHER" => Ok(Role::Teacher),
        "PARENT" => Ok(Role::Parent),
        _ => Err(CliError::UnknownRoleError(name.to_string())),
    }
}
