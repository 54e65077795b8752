use super::{
    error::ServerError,
    listen::Listener,
    options::Shutdown,
    pipeline::Pipeline,
    shutdown,
    tls::{self, TlsConfig},
};
use crate::{
    auth::DEFAULT_REALM,
    dav,
    resource::{NoShares, ShareAccess},
    vfs::VirtualFs,
};
use homedav_core::{auth::UserStore, storage::StorageBackend};
use homedav_sbe_fs::Filesystem;
use slog::Drain;
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    net::SocketAddr,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
};

type ShutdownIndicator = Pin<Box<dyn Future<Output = Shutdown> + Send>>;

/// Used to create [`Server`]s.
///
/// # Example
///
/// ```no_run
/// use homedav::ServerBuilder;
/// use homedav_auth_jsonfile::JsonFileUserStore;
/// use homedav_sbe_fs::Filesystem;
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let users = Arc::new(JsonFileUserStore::from_file("/srv/dav/users.json")?);
/// let server = ServerBuilder::new(Filesystem::new("/srv/dav")?, users)
///     .realm("My files")
///     .build()?;
/// server.listen("127.0.0.1:8080").await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder<S, U: ?Sized> {
    storage: Arc<S>,
    user_store: Arc<U>,
    realm: String,
    logger: slog::Logger,
    tls: TlsConfig,
    share_access: Arc<dyn ShareAccess>,
    collect_metrics: bool,
    shutdown: ShutdownIndicator,
}

impl<U> ServerBuilder<Filesystem, U>
where
    U: UserStore + ?Sized + 'static,
{
    /// Creates a builder that stores everything below `path` on the local disk.
    pub fn with_fs<P: Into<PathBuf>>(path: P, user_store: Arc<U>) -> std::io::Result<Self> {
        Ok(ServerBuilder::new(Filesystem::new(path)?, user_store))
    }
}

impl<S, U> ServerBuilder<S, U>
where
    S: StorageBackend + 'static,
    U: UserStore + ?Sized + 'static,
{
    /// Construct a new [`ServerBuilder`] with the given storage back-end and user store. The
    /// other options are set to their defaults.
    pub fn new(storage: S, user_store: Arc<U>) -> Self {
        ServerBuilder {
            storage: Arc::new(storage),
            user_store,
            realm: DEFAULT_REALM.to_string(),
            logger: slog::Logger::root(slog_stdlog::StdLog {}.fuse(), slog::o!()),
            tls: TlsConfig::Off,
            share_access: Arc::new(NoShares),
            collect_metrics: false,
            shutdown: Box::pin(futures::future::pending()),
        }
    }

    /// Sets the realm announced in the `WWW-Authenticate` challenge. Defaults to
    /// `Restricted Access`.
    pub fn realm<R: Into<String>>(mut self, realm: R) -> Self {
        self.realm = realm.into();
        self
    }

    /// Sets the structured logger to use. By default everything goes to the `log` crate.
    pub fn logger<L: Into<Option<slog::Logger>>>(mut self, logger: L) -> Self {
        self.logger = logger.into().unwrap_or_else(|| slog::Logger::root(slog_stdlog::StdLog {}.fuse(), slog::o!()));
        self
    }

    /// Serves HTTPS using the PEM encoded certificate chain and private key in the given files.
    pub fn tls<P: Into<PathBuf>>(mut self, certs_file: P, key_file: P) -> Self {
        self.tls = TlsConfig::Building {
            certs_file: certs_file.into(),
            key_file: key_file.into(),
        };
        self
    }

    /// Sets the hook that decides who may enter which shared folder. By default nobody may.
    pub fn share_access(mut self, share_access: Arc<dyn ShareAccess>) -> Self {
        self.share_access = share_access;
        self
    }

    /// Enables the collection of prometheus metrics.
    pub fn metrics(mut self) -> Self {
        self.collect_metrics = true;
        self
    }

    /// Allows telling the server when and how to shut down gracefully. Once the given future
    /// resolves the server stops accepting connections and gives the open ones the
    /// [`Shutdown`]'s grace period to finish.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use homedav::{options::Shutdown, ServerBuilder};
    /// use homedav_auth_jsonfile::JsonFileUserStore;
    /// use std::{sync::Arc, time::Duration};
    ///
    /// # fn build() -> Result<(), Box<dyn std::error::Error>> {
    /// let users = Arc::new(JsonFileUserStore::from_file("/srv/dav/users.json")?);
    /// let builder = ServerBuilder::with_fs("/srv/dav", users)?.shutdown_indicator(async {
    ///     tokio::signal::ctrl_c().await.ok();
    ///     Shutdown::new().grace_period(Duration::from_secs(5))
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn shutdown_indicator<I>(mut self, indicator: I) -> Self
    where
        I: Future<Output = Shutdown> + Send + 'static,
    {
        self.shutdown = Box::pin(indicator);
        self
    }

    /// Finalizes the options, loading the TLS certificates if any, and creates the [`Server`].
    pub fn build(self) -> Result<Server<S, U>, ServerError> {
        let tls = match self.tls {
            TlsConfig::Building { certs_file, key_file } => TlsConfig::On {
                tls_config: tls::new_config(certs_file, key_file)?,
            },
            other => other,
        };
        Ok(Server {
            storage: self.storage,
            user_store: self.user_store,
            realm: self.realm,
            logger: self.logger,
            tls,
            share_access: self.share_access,
            collect_metrics: self.collect_metrics,
            shutdown: self.shutdown,
        })
    }
}

impl<S: Debug, U: Debug + ?Sized> Debug for ServerBuilder<S, U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("storage", &self.storage)
            .field("user_store", &self.user_store)
            .field("realm", &self.realm)
            .field("tls", &self.tls)
            .field("share_access", &self.share_access)
            .field("collect_metrics", &self.collect_metrics)
            .finish()
    }
}

/// A WebDAV server serving every user their own home folder. Create it with a
/// [`ServerBuilder`] and start it with [`listen`](Server::listen).
pub struct Server<S, U: ?Sized> {
    storage: Arc<S>,
    user_store: Arc<U>,
    realm: String,
    logger: slog::Logger,
    tls: TlsConfig,
    share_access: Arc<dyn ShareAccess>,
    collect_metrics: bool,
    shutdown: ShutdownIndicator,
}

impl<S, U> Server<S, U>
where
    S: StorageBackend + 'static,
    U: UserStore + ?Sized + 'static,
{
    /// Prepares the storage root and serves requests on `bind_address` until the shutdown
    /// indicator resolves.
    pub async fn listen<T: Into<String>>(self, bind_address: T) -> Result<(), ServerError> {
        let bind_address: SocketAddr = bind_address.into().parse()?;
        self.storage.init().await?;

        let vfs = VirtualFs::with_shares(Arc::clone(&self.storage), self.share_access);
        let pipeline = Arc::new(Pipeline {
            dav: dav::handler(vfs.clone()),
            vfs,
            user_store: self.user_store,
            realm: self.realm,
            logger: self.logger.clone(),
            collect_metrics: self.collect_metrics,
        });
        let tls_acceptor = match self.tls {
            TlsConfig::On { tls_config } => Some(tokio_rustls::TlsAcceptor::from(tls_config)),
            _ => None,
        };

        Listener {
            bind_address,
            logger: self.logger,
            pipeline,
            tls_acceptor,
            shutdown_topic: Arc::new(shutdown::Notifier::new()),
        }
        .listen(self.shutdown)
        .await
    }
}

impl<S: Debug, U: Debug + ?Sized> Debug for Server<S, U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("storage", &self.storage)
            .field("user_store", &self.user_store)
            .field("realm", &self.realm)
            .field("tls", &self.tls)
            .field("collect_metrics", &self.collect_metrics)
            .finish()
    }
}
