use std::fs;

use argh::FromArgs;
use camino::Utf8PathBuf;
use campus_core::jwks::Jwks;
use openssl::rsa::Rsa;

use crate::CliError;

const DEFAULT_KEY_SIZE: u32 = 2048;

/// Generate a .env file with the signing key and JWKS the server needs.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "server-env")]
pub struct GenerateServerEnv {
    /// path to env file to create (default: server.env in current directory)
    #[argh(positional, default = "Utf8PathBuf::from(\"server.env\")")]
    file_name: Utf8PathBuf,

    /// key size in bits (default: 2048)
    #[argh(option, default = "DEFAULT_KEY_SIZE")]
    size: u32,
}

impl GenerateServerEnv {
    pub async fn run(&self) -> Result<(), CliError> {
        tracing::info!("generating new signing key ({} bits)", self.size);
        let key = Rsa::generate(self.size)?;
        let private_key_pem = key.private_key_to_pem()?;

        tracing::info!("generating JSON Web Key Set for signing key");
        let jwks = Jwks::from_pem(&private_key_pem).map_err(CliError::JWTJWKSGenerationError)?;

        let mut dot_env = String::new();
        dot_env.push_str(&env_line(
            "SERVER_CERTIFICATE",
            std::str::from_utf8(&private_key_pem).unwrap(),
        ));
        dot_env.push_str(&env_line("JWKS", &jwks.to_string()));

        tracing::info!("saving to {}", self.file_name);

        fs::write(&self.file_name, dot_env)?;

        Ok(())
    }
}

fn env_line(name: &str, value: &str) -> String {
    let mut line = String::new();
    line.push_str(name);
    line.push('=');
    line.push_str(&shell_quote(value));
    line.push('\n');
    line
}

fn shell_quote(value: &str) -> String {
    if value.contains('\n') || value.contains('\t') || value.contains('\r') {
        // double quote
        format!(
            "\"{}\"",
            value
                .replace('\n', "\\n")
                .replace('\t', "\\t")
                .replace('\r', "\\r")
        )
    } else {
        // single quote
        format!("'{}'", value)
    }
}
