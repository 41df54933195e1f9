use std::fs;

use argh::FromArgs;
use camino::Utf8PathBuf;
use campus_core::jwks::Jwks;

use crate::CliError;

/// Generate a JSON Web Key Set for the public half of a signing key.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "jwks")]
pub struct GenerateJwks {
    /// path to PEM file containing the RSA private key
    #[argh(positional)]
    key_file_name: Utf8PathBuf,

    /// path to output JWKS file
    #[argh(positional)]
    file_name: Utf8PathBuf,
}

impl GenerateJwks {
    pub async fn run(&self) -> Result<(), CliError> {
        tracing::info!("deriving JWKS from key in {}", self.key_file_name);

        let pem = fs::read(&self.key_file_name)?;
        let jwks = Jwks::from_pem(&pem).map_err(CliError::JWTJWKSGenerationError)?;

        tracing::info!("key IDs: {:?}", jwks.key_ids());
        tracing::info!("saving JWKS to {}", self.file_name);
        fs::write(&self.file_name, serde_json::to_string_pretty(&jwks)?)?;

        Ok(())
    }
}
