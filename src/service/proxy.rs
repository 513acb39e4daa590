use std::net::SocketAddr;

use http_body_util::BodyExt;
use hyper::{body::Incoming, header, upgrade::OnUpgrade, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::http::{
    request::ProxyRequest,
    response::{BoxBodyResponse, LocalResponse},
};

/// Forwards the request to the upstream server and returns its response. The
/// request must have gone through the forwarding pipeline already, see
/// [`ProxyRequest::forward_through`]. If the client wants to upgrade the
/// connection and the server agrees by sending a `101` status code, then a TCP
/// tunnel that forwards traffic bidirectionally is spawned in a new Tokio task.
pub(super) async fn forward(
    mut request: ProxyRequest<Incoming>,
    to: SocketAddr,
) -> Result<BoxBodyResponse, hyper::Error> {
    let stream = match TcpStream::connect(to).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(upstream = %to, %err, "could not connect to upstream server");
            return Ok(LocalResponse::bad_gateway());
        }
    };

    let (mut sender, conn) = hyper::client::conn::http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .handshake(TokioIo::new(stream))
        .await?;

    tokio::task::spawn(async move {
        if let Err(err) = conn.with_upgrades().await {
            tracing::warn!(upstream = %to, %err, "upstream connection failed");
        }
    });

    let client_upgrade = if request.headers().contains_key(header::UPGRADE) {
        request.extensions_mut().remove::<OnUpgrade>()
    } else {
        None
    };

    let mut response = sender.send_request(request.into_forwarded()).await?;

    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        let server_upgrade = response.extensions_mut().remove::<OnUpgrade>();

        match (client_upgrade, server_upgrade) {
            (Some(client), Some(server)) => {
                tokio::task::spawn(tunnel(client, server));
            }
            // Upstream server sent us an HTTP 101 response without the client
            // asking for an upgrade, so we can't proxy data from the client.
            _ => return Ok(LocalResponse::bad_gateway()),
        }
    }

    Ok(response.map(|body| body.boxed()))
}

/// TCP tunnel for upgraded connections such as Websockets or any other custom
/// protocol. This future should be spawned in a [`tokio::task`] as the client
/// [`hyper::upgrade::Upgraded`] connection won't resolve until we send an
/// `HTTP 101` response back to the client.
async fn tunnel(client: OnUpgrade, server: OnUpgrade) {
    let (client, server) = match tokio::try_join!(client, server) {
        Ok(upgraded) => upgraded,
        Err(err) => {
            tracing::warn!(%err, "connection upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut server = TokioIo::new(server);

    match tokio::io::copy_bidirectional(&mut client, &mut server).await {
        Ok((client_bytes, server_bytes)) => {
            tracing::debug!(client_bytes, server_bytes, "tunnel closed");
        }
        Err(err) => tracing::warn!(%err, "tunnel error"),
    }
}
