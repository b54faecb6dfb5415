//! TLS support for DIMSE connections
//!
//! Certificates and keys are handed to the transport as PEM files; this
//! module checks them up front so a broken TLS setup is reported before any
//! association is attempted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::TlsConfig;
use crate::{DimseError, Result};

/// Check that the certificate chain, key and optional CA bundle are usable
pub fn check_tls_files(tls: &TlsConfig) -> Result<()> {
    let certs = read_certs(&tls.cert_path)?;
    if certs == 0 {
        return Err(DimseError::Tls(format!(
            "No certificate found in {}",
            tls.cert_path.display()
        )));
    }

    let mut reader = BufReader::new(File::open(&tls.key_path)?);
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DimseError::Tls(format!("{}: {}", tls.key_path.display(), e)))?;
    if key.is_none() {
        return Err(DimseError::Tls(format!(
            "No private key found in {}",
            tls.key_path.display()
        )));
    }

    if let Some(ca) = &tls.ca_bundle_path {
        if read_certs(ca)? == 0 {
            return Err(DimseError::Tls(format!("No CA certificate in {}", ca.display())));
        }
    }

    Ok(())
}

fn read_certs(path: &Path) -> Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DimseError::Tls(format!("{}: {}", path.display(), e)))?;
    Ok(certs.len())
}
