use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::StoresServerSessions,
};
use std::{
    fmt::{self, Debug, Formatter},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

// TlsConfig shows whether and how the server speaks HTTPS.
#[derive(Clone)]
pub enum TlsConfig {
    Off,
    Building { certs_file: PathBuf, key_file: PathBuf },
    On { tls_config: Arc<ServerConfig> },
}

impl Debug for TlsConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TlsConfig::Off => write!(f, "Off"),
            TlsConfig::Building { .. } => write!(f, "Building"),
            TlsConfig::On { .. } => write!(f, "On"),
        }
    }
}

/// Problems loading the certificate chain or the private key.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A PEM file could not be read.
    #[error("could not read {path:?}: {source}")]
    Load {
        /// The file that failed.
        path: PathBuf,
        /// Why.
        #[source]
        source: std::io::Error,
    },
    /// The certificate file holds no certificates.
    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),
    /// The key file holds no private key.
    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),
    /// rustls did not accept the certificate and key.
    #[error("{0}")]
    Rustls(#[from] rustls::Error),
}

pub fn new_config<P: AsRef<Path>>(certs_file: P, key_file: P) -> Result<Arc<ServerConfig>, ConfigError> {
    let certs = load_certs(certs_file.as_ref())?;
    let key = load_private_key(key_file.as_ref())?;

    let mut config = ServerConfig::builder().with_no_client_auth().with_single_cert(certs, key)?;
    // Support session resumption with server side state (Session IDs)
    config.session_storage = TlsSessionCache::new(1024);
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(ConfigError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

// Takes the first PKCS#8, PKCS#1 or SEC1 key in the file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ConfigError::NoPrivateKey(path.to_path_buf()))
}

/// Stores the session IDs server side.
struct TlsSessionCache {
    cache: moka::sync::Cache<Vec<u8>, Vec<u8>>,
}

impl TlsSessionCache {
    /// Make a new TlsSessionCache. `size` is the maximum number of stored sessions.
    pub fn new(size: u64) -> Arc<TlsSessionCache> {
        debug_assert!(size > 0);
        Arc::new(TlsSessionCache {
            cache: moka::sync::CacheBuilder::new(size).time_to_idle(Duration::from_secs(5 * 60)).build(),
        })
    }
}

impl Debug for TlsSessionCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSessionCache").field("entries", &self.cache.entry_count()).finish()
    }
}

impl StoresServerSessions for TlsSessionCache {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.cache.insert(key, value);
        true
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.cache.get(key)
    }

    fn take(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.cache.remove(key)
    }

    fn can_cache(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_config(dir.path().join("cert.pem"), dir.path().join("key.pem")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }), "{err}");
    }

    #[test]
    fn files_without_pem_blocks_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate\n").unwrap();
        std::fs::write(&key, "not a key\n").unwrap();

        assert!(matches!(load_certs(&cert), Err(ConfigError::NoCertificates(_))));
        assert!(matches!(load_private_key(&key), Err(ConfigError::NoPrivateKey(_))));
    }

    #[test]
    fn session_cache_hands_sessions_out_once() {
        let cache = TlsSessionCache::new(8);
        assert!(cache.put(b"id".to_vec(), b"state".to_vec()));
        assert_eq!(cache.get(b"id"), Some(b"state".to_vec()));
        assert_eq!(cache.take(b"id"), Some(b"state".to_vec()));
        assert_eq!(cache.get(b"id"), None);
    }
}
