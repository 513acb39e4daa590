//! Wrappers and abstractions over [`hyper`] HTTP services.

use std::{convert::Infallible, future::Future, pin::Pin};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, service::Service, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpStream, sync::mpsc};

/// Upstream server that shares every request it receives on a channel. This
/// allows us to write cleaner tests where all asserts are done in the test
/// function, not on a separate task.
#[derive(Clone)]
pub struct RequestInterceptor {
    tx: mpsc::Sender<(http::request::Parts, Bytes)>,
}

impl RequestInterceptor {
    pub fn new(tx: mpsc::Sender<(http::request::Parts, Bytes)>) -> Self {
        Self { tx }
    }
}

impl Service<Request<Incoming>> for RequestInterceptor {
    type Response = Response<Full<Bytes>>;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let tx = self.tx.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();

            tx.send((parts, body.collect().await.unwrap().to_bytes()))
                .await
                .unwrap();

            Ok(Response::new(Full::<Bytes>::from("Hello world")))
        })
    }
}

/// Serves an HTTP connection with the given service.
pub async fn serve_connection<S>(stream: TcpStream, service: S)
where
    S: Service<Request<Incoming>, Response = Response<Full<Bytes>>, Error = Infallible>,
{
    hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
        .unwrap();
}
