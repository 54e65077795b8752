use clap::Args;
use homedav::{ServerBuilder, accounts, auth::DEFAULT_REALM, options::Shutdown};
use homedav_auth_jsonfile::JsonFileUserStore;
use homedav_sbe_fs::Filesystem;
use std::{error::Error, path::Path, path::PathBuf, sync::Arc, time::Duration};

#[derive(Args)]
pub struct StartArgs {
    /// Address to listen on
    #[arg(long, env = "HOMEDAV_ADDRESS", default_value = "0.0.0.0:8080")]
    addr: String,

    /// Realm announced to clients when asking for credentials
    #[arg(long, env = "HOMEDAV_REALM", default_value = DEFAULT_REALM)]
    realm: String,

    /// Serve HTTPS instead of HTTP
    #[arg(long, env = "HOMEDAV_TLS")]
    tls: bool,

    /// PEM file with the certificate chain, used with --tls
    #[arg(long, env = "HOMEDAV_CERTFILE", default_value = "cert.pem")]
    cert_file: PathBuf,

    /// PEM file with the private key, used with --tls
    #[arg(long, env = "HOMEDAV_KEYFILE", default_value = "key.pem")]
    key_file: PathBuf,

    /// Seconds open connections get to finish when shutting down
    #[arg(long, env = "HOMEDAV_GRACE_PERIOD", default_value_t = 10)]
    grace_period: u64,
}

pub async fn run(data: &Path, args: StartArgs, logger: slog::Logger) -> Result<(), Box<dyn Error>> {
    let users = Arc::new(JsonFileUserStore::open(data.join("users.json"))?);
    let storage = Filesystem::new(data)?;

    let count = accounts::ensure_homes(users.as_ref(), &storage).await?;
    if count == 0 {
        return Err("no users configured, add one with `homedav users add <name>`".into());
    }
    slog::info!(logger, "Serving {} users from {}", count, data.display());

    let grace_period = Duration::from_secs(args.grace_period);
    let shutdown_logger = logger.clone();
    let mut builder = ServerBuilder::new(storage, users)
        .realm(args.realm)
        .logger(logger)
        .shutdown_indicator(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                slog::error!(shutdown_logger, "Could not listen for ctrl-c: {}", err);
                futures::future::pending::<()>().await;
            }
            Shutdown::new().grace_period(grace_period)
        });
    #[cfg(feature = "prometheus")]
    {
        builder = builder.metrics();
    }
    if args.tls {
        builder = builder.tls(args.cert_file, args.key_file);
    }
    builder.build()?.listen(args.addr).await?;
    Ok(())
}
