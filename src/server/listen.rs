//! Contains the code that accepts connections and serves HTTP on them.

use super::{
    error::{ServerError, ShutdownError},
    options::Shutdown,
    pipeline::Pipeline,
    shutdown,
};
use homedav_core::{auth::UserStore, storage::StorageBackend};
use hyper::{Request, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, future::Future, net::SocketAddr, pin::Pin, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;

// Listener accepts connections on a TCP port and serves each of them in a new task.
pub struct Listener<S, U: ?Sized> {
    pub bind_address: SocketAddr,
    pub logger: slog::Logger,
    pub pipeline: Arc<Pipeline<S, U>>,
    pub tls_acceptor: Option<TlsAcceptor>,
    pub shutdown_topic: Arc<shutdown::Notifier>,
}

impl<S, U> Listener<S, U>
where
    S: StorageBackend + 'static,
    U: UserStore + ?Sized + 'static,
{
    pub async fn listen(self, mut shutdown_indicator: Pin<Box<dyn Future<Output = Shutdown> + Send>>) -> Result<(), ServerError> {
        let Listener {
            logger,
            bind_address,
            pipeline,
            tls_acceptor,
            shutdown_topic,
        } = self;
        let listener = TcpListener::bind(bind_address).await?;
        slog::info!(logger, "Listening on {}", bind_address; "tls" => tls_acceptor.is_some());

        let shutdown = loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((tcp_stream, peer)) => {
                        slog::debug!(logger, "Incoming connection from {:?}", peer);
                        let conn = Connection {
                            pipeline: Arc::clone(&pipeline),
                            logger: logger.new(slog::o!("peer" => peer.to_string())),
                            shutdown: shutdown_topic.subscribe().await,
                        };
                        match &tls_acceptor {
                            Some(acceptor) => {
                                let acceptor = acceptor.clone();
                                tokio::spawn(async move {
                                    match acceptor.accept(tcp_stream).await {
                                        Ok(tls_stream) => conn.serve(tls_stream).await,
                                        Err(err) => slog::warn!(conn.logger, "TLS handshake failed: {}", err),
                                    }
                                });
                            }
                            None => {
                                tokio::spawn(conn.serve(tcp_stream));
                            }
                        }
                    }
                    Err(err) => {
                        slog::error!(logger, "Error accepting incoming connection {:?}", err);
                    }
                },
                shutdown = &mut shutdown_indicator => break shutdown,
            }
        };

        slog::info!(logger, "Shutting down within {:?}", shutdown.grace_period);
        drop(listener);
        shutdown_topic.notify().await;
        match tokio::time::timeout(shutdown.grace_period, shutdown_topic.linger()).await {
            Ok(()) => {
                slog::info!(logger, "Graceful shutdown complete");
                Ok(())
            }
            Err(_) => Err(ShutdownError {
                msg: "shutdown grace period expired".to_string(),
            }
            .into()),
        }
    }
}

struct Connection<S, U: ?Sized> {
    pipeline: Arc<Pipeline<S, U>>,
    logger: slog::Logger,
    shutdown: shutdown::Listener,
}

impl<S, U> Connection<S, U>
where
    S: StorageBackend + 'static,
    U: UserStore + ?Sized + 'static,
{
    async fn serve<IO>(self, io: IO)
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let Connection {
            pipeline,
            logger,
            mut shutdown,
        } = self;
        let service = service_fn(move |req: Request<Incoming>| {
            let pipeline = Arc::clone(&pipeline);
            async move { Ok::<_, Infallible>(pipeline.handle(req).await) }
        });
        let conn = http1::Builder::new().serve_connection(TokioIo::new(io), service);
        tokio::pin!(conn);

        let mut shutting_down = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(err) = result {
                        slog::debug!(logger, "Connection ended with an error: {}", err);
                    }
                    break;
                }
                _ = shutdown.listen(), if !shutting_down => {
                    conn.as_mut().graceful_shutdown();
                    shutting_down = true;
                }
            }
        }
    }
}
