//! The per-request pipeline: authentication gate, pre-flight checks, the WebDAV engine and the
//! access log.

use crate::{
    auth::{self, Outcome},
    resource,
    vfs::VirtualFs,
};
use dav_server::{DavHandler, body::Body};
use homedav_core::{
    auth::{User, UserStore},
    storage::StorageBackend,
};
use hyper::{Method, Request, Response, StatusCode, Uri, body::Incoming};
use percent_encoding::percent_decode_str;
use std::{sync::Arc, time::Instant};
use uuid::Uuid;

/// Everything a request needs, shared by all connections.
pub(crate) struct Pipeline<S, U: ?Sized> {
    pub vfs: VirtualFs<S>,
    pub user_store: Arc<U>,
    pub dav: DavHandler<User>,
    pub realm: String,
    pub logger: slog::Logger,
    pub collect_metrics: bool,
}

impl<S, U> Pipeline<S, U>
where
    S: StorageBackend + 'static,
    U: UserStore + ?Sized + 'static,
{
    pub async fn handle(&self, req: Request<Incoming>) -> Response<Body> {
        let started = Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let logger = self.logger.new(slog::o!("request" => Uuid::new_v4().to_string()));
        if self.collect_metrics {
            add_request_metric(&method);
        }

        let (response, user) = match auth::authenticate(self.user_store.as_ref(), req.headers()).await {
            Outcome::Authenticated(user) => {
                let response = self.serve(req, &user, &logger).await;
                (response, Some(user))
            }
            Outcome::Challenge => (auth::challenge(&self.realm), None),
            Outcome::Failure(err) => {
                slog::error!(logger, "User store failed: {}", err; "error" => ?err);
                (auth::status_response(StatusCode::INTERNAL_SERVER_ERROR), None)
            }
        };

        if self.collect_metrics {
            add_response_metric(response.status());
        }
        log_request(&logger, &method, &uri, response.status(), user.as_ref(), started);
        response
    }

    async fn serve(&self, req: Request<Incoming>, user: &User, logger: &slog::Logger) -> Response<Body> {
        if !preflight(&self.vfs, user, &req) {
            slog::info!(logger, "Refused {} of {} before it started", req.method(), req.uri().path(); "user" => user.username());
            return auth::status_response(StatusCode::FORBIDDEN);
        }
        self.dav.handle_guarded(req, user.clone()).await
    }
}

// The WebDAV engine deletes and moves collections one child at a time and would get far before
// it finds out that the collection itself is off limits. A COPY with overwrite also clears the
// destination before copying. Whole-tree operations are therefore checked up front.
pub(crate) fn preflight<S: StorageBackend, B>(vfs: &VirtualFs<S>, user: &User, req: &Request<B>) -> bool {
    let source = decoded_path(req.uri());
    match req.method().as_str() {
        "DELETE" => vfs.check_modify(user, &source),
        "MOVE" => match destination(req) {
            Some(Ok(destination)) => vfs.check_modify(user, &source) && vfs.check_modify(user, &destination),
            Some(Err(())) => false,
            None => true,
        },
        "COPY" => match destination(req) {
            Some(Ok(destination)) => {
                vfs.resolve(user, &source).can_open() && vfs.check_modify(user, &destination) && !is_within(&destination, &source)
            }
            Some(Err(())) => false,
            None => true,
        },
        _ => true,
    }
}

// The decoded path of the Destination header. Without one the engine answers 400 on its own.
fn destination<B>(req: &Request<B>) -> Option<Result<String, ()>> {
    let header = req.headers().get("destination")?;
    let uri = header.to_str().ok().and_then(|value| value.parse::<Uri>().ok());
    Some(uri.map(|uri| decoded_path(&uri)).ok_or(()))
}

// Whether `path` is `ancestor` or lies below it.
fn is_within(path: &str, ancestor: &str) -> bool {
    let (path, ancestor) = (resource::normalize(path), resource::normalize(ancestor));
    path == ancestor || path.starts_with(&format!("{}/", ancestor.trim_end_matches('/')))
}

fn decoded_path(uri: &Uri) -> String {
    percent_decode_str(uri.path()).decode_utf8_lossy().into_owned()
}

fn log_request(logger: &slog::Logger, method: &Method, uri: &Uri, status: StatusCode, user: Option<&User>, started: Instant) {
    let micros = started.elapsed().as_micros() as u64;
    let user = user.map(User::username).unwrap_or("-");
    slog::info!(logger, "{:>10} : {:<48} in {:>3}µs", method.as_str(), uri.path(), micros;
        "method" => method.as_str(),
        "uri" => %uri,
        "status" => status.as_u16(),
        "user" => user,
        "duration_us" => micros
    );
}

#[cfg(feature = "prometheus")]
fn add_request_metric(method: &Method) {
    crate::metrics::add_request_metric(method);
}

#[cfg(not(feature = "prometheus"))]
fn add_request_metric(_method: &Method) {}

#[cfg(feature = "prometheus")]
fn add_response_metric(status: StatusCode) {
    crate::metrics::add_response_metric(status);
}

#[cfg(not(feature = "prometheus"))]
fn add_response_metric(_status: StatusCode) {}
