//! HTTP/WS server assembly: routing, CORS, TLS termination, port pick.

use crate::net;
use crate::web::{api_core, api_local};
use crate::web::shared::SharedState;
use crate::ws::mouse::ws_mouse_handler;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{HeaderValue, Method, Request};
use axum::routing::get;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::service::TowerToHyperService;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::PrivateKeyDer;
use tokio_rustls::TlsAcceptor;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::services::ServeDir;

const STATIC_DIR: &str = "static";

fn cors_layer(state: &SharedState) -> CorsLayer {
    let (origins, allow_credentials) = {
        let cfg = state.config.read();
        (cfg.cors_origins.clone(), cfg.cors_allow_credentials)
    };
    let wildcard = origins.iter().any(|o| o == "*");
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if wildcard {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(methods)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(allow_credentials)
}

/// Assemble the full application router.
pub fn build_router(state: Arc<SharedState>) -> Router {
    let cors = cors_layer(&state);
    let mut app = Router::new()
        .merge(api_core::router())
        .merge(api_local::router())
        .route("/ws/mouse", get(ws_mouse_handler))
        .with_state(state);
    if Path::new(STATIC_DIR).is_dir() {
        app = app.fallback_service(ServeDir::new(STATIC_DIR));
    }
    app.layer(cors)
}

/// Resolve the listen port, moving off a busy one when auto-pick is on.
pub fn pick_port(state: &SharedState) -> u16 {
    let (configured, auto) = {
        let cfg = state.config.read();
        (cfg.port, cfg.port_auto)
    };
    if net::port_available(configured) || !auto {
        return configured;
    }
    let picked = net::find_free_port(configured);
    warn!("Port {} busy, moving to {}", configured, picked);
    state.config.write().port = picked;
    picked
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn serve(state: Arc<SharedState>) -> Result<(), Box<dyn std::error::Error>> {
    let port = pick_port(&state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_router(state.clone());

    let (tls_enabled, cert_path, key_path, scheme) = {
        let cfg = state.config.read();
        (
            cfg.tls_enabled,
            cfg.tls_cert.clone(),
            cfg.tls_key.clone(),
            cfg.scheme(),
        )
    };
    info!("HTTP server listening on {}://{}", scheme, addr);

    if tls_enabled {
        serve_tls(addr, app, &cert_path, &key_path).await
    } else {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

fn load_tls_acceptor(
    cert_path: &str,
    key_path: &str,
) -> Result<TlsAcceptor, Box<dyn std::error::Error>> {
    let mut cert_reader = std::io::BufReader::new(std::fs::File::open(cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err("TLS certificate file contains no certificates".into());
    }
    let mut key_reader = std::io::BufReader::new(std::fs::File::open(key_path)?);
    let key: PrivateKeyDer = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or("TLS key file contains no private key")?;
    let server_config = tokio_rustls::rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

async fn serve_tls(
    addr: SocketAddr,
    app: Router,
    cert_path: &str,
    key_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let acceptor = load_tls_acceptor(cert_path, key_path)?;
    let listener = TcpListener::bind(addr).await?;
    let mut shutdown = std::pin::pin!(shutdown_signal());

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!("TLS accept failed: {}", err);
                    continue;
                }
            },
        };
        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(err) => {
                    warn!("TLS handshake with {} failed: {}", peer, err);
                    return;
                }
            };
            let service = tower::ServiceBuilder::new()
                .map_request(move |mut req: Request<hyper::body::Incoming>| {
                    req.extensions_mut().insert(ConnectInfo(peer));
                    req
                })
                .service(app);
            let result = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(
                    TokioIo::new(tls_stream),
                    TowerToHyperService::new(service),
                )
                .await;
            if let Err(err) = result {
                error!("TLS connection error from {}: {}", peer, err);
            }
        });
    }
    Ok(())
}
