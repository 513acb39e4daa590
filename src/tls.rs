//! TLS termination. Connections accepted through the [`TlsAcceptor`] built
//! here are tagged as [`crate::Transport::Tls`], which is what makes the
//! forwarding stages report `https` and port 443 to the upstream server.

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use rustls::pki_types::CertificateDer;
use tokio_rustls::TlsAcceptor;

use crate::{config, Error};

/// Creates a TLS acceptor from the PEM certificate chain and private key
/// files given in the configuration.
pub fn acceptor(config: &config::Tls) -> Result<TlsAcceptor, Error> {
    let certs = load_certs(&config.cert)?;

    let mut reader = BufReader::new(File::open(&config.key)?);
    let key = rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| Error::MissingPrivateKey(config.key.clone()))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(Error::MissingCertificate(path.to_path_buf()));
    }

    Ok(certs)
}
