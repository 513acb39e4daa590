//! Self-signed certificates and TLS clients for testing TLS termination.

use std::{net::SocketAddr, sync::Arc};

use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Name in the certificate, clients connect using this name for SNI.
pub const SERVER_NAME: &str = "localhost";

/// Certificate and key written to a temporary directory plus a connector that
/// trusts them. The files are removed when this is dropped, but servers only
/// read them on initialization.
pub struct SelfSigned {
    pub dir: TempDir,
    pub config: auspice::config::Tls,
    pub connector: TlsConnector,
}

pub fn self_signed() -> SelfSigned {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_owned()]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = auspice::config::Tls {
        cert: dir.path().join("cert.pem"),
        key: dir.path().join("key.pem"),
    };

    std::fs::write(&config.cert, cert.pem()).unwrap();
    std::fs::write(&config.key, key_pair.serialize_pem()).unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert.der().clone()).unwrap();

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    SelfSigned {
        dir,
        config,
        connector: TlsConnector::from(Arc::new(client_config)),
    }
}

/// Opens a TCP connection to `addr` and completes the TLS handshake.
pub async fn connect(connector: &TlsConnector, addr: SocketAddr) -> TlsStream<TcpStream> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from(SERVER_NAME).unwrap();

    connector.connect(name, stream).await.unwrap()
}
