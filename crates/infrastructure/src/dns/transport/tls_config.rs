use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use splitroute_domain::{DomainError, TlsParams};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Builds the client TLS configuration shared by a group's TLS upstreams.
///
/// `ca` replaces the bundled web roots; `cert` and `key` together enable
/// client authentication.
pub fn build_client_config(params: Option<&TlsParams>) -> Result<Arc<ClientConfig>, DomainError> {
    let mut roots = RootCertStore::empty();
    match params.and_then(|p| p.ca.as_deref()) {
        Some(ca) => {
            for cert in load_certs(ca)? {
                roots
                    .add(cert)
                    .map_err(|e| DomainError::Tls(format!("{}: {e}", ca.display())))?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| DomainError::Tls(e.to_string()))?
        .with_root_certificates(roots);

    let client_auth = params.and_then(|p| p.cert.as_deref().zip(p.key.as_deref()));
    let config = match client_auth {
        Some((cert, key)) => builder
            .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
            .map_err(|e| DomainError::Tls(e.to_string()))?,
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, DomainError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| DomainError::Tls(format!("{}: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::Tls(format!("{}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(DomainError::Tls(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, DomainError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| DomainError::Tls(format!("{}: {e}", path.display())))?
        .ok_or_else(|| DomainError::Tls(format!("{}: no private key found", path.display())))
}
