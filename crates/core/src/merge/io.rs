//! Reading merge inputs from disk and writing merged output.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::InputError;
use crate::models::{CertificateResponse, Domain};

use super::reconcile::merge;

fn load_json<T: DeserializeOwned>(kind: &'static str, path: &Path) -> Result<T, InputError> {
    let display = path.display().to_string();
    let data = fs::read(path).map_err(|source| InputError::Read {
        kind,
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| InputError::Parse {
        kind,
        path: display,
        source,
    })
}

/// Load the initial domain list.
pub fn load_domains(path: impl AsRef<Path>) -> Result<Vec<Domain>, InputError> {
    let path = path.as_ref();
    let domains: Vec<Domain> = load_json("initial", path)?;
    debug!(path = %path.display(), count = domains.len(), "loaded domains");
    Ok(domains)
}

/// Load a certificate-fetch response document.
pub fn load_response(path: impl AsRef<Path>) -> Result<CertificateResponse, InputError> {
    let path = path.as_ref();
    let response: CertificateResponse = load_json("response", path)?;
    debug!(path = %path.display(), results = response.results.len(), "loaded certificate response");
    Ok(response)
}

/// Load both inputs and merge them.
pub fn merge_files(
    initial: impl AsRef<Path>,
    response: impl AsRef<Path>,
) -> Result<Vec<Domain>, InputError> {
    let domains = load_domains(initial)?;
    let response = load_response(response)?;
    Ok(merge(&domains, &response))
}

/// Encode a value as JSON; `pretty` uses four-space indentation.
pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, InputError> {
    if !pretty {
        return Ok(serde_json::to_string(value)?);
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write domains as JSON. The file may hold bind passwords, so on Unix it is
/// created readable by the owner only.
pub fn write_json(path: impl AsRef<Path>, domains: &[Domain], pretty: bool) -> Result<(), InputError> {
    let path = path.as_ref();
    let mut body = to_json(domains, pretty)?;
    body.push('\n');

    let write_err = |source| InputError::Write {
        path: path.display().to_string(),
        source,
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(write_err)?;
    file.write_all(body.as_bytes()).map_err(write_err)?;

    debug!(path = %path.display(), domains = domains.len(), "wrote merged output");
    Ok(())
}
