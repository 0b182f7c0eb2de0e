use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::tls::{self, TlsError, TlsMaterial};
use crate::AppState;

const SECURE_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct AssetServerConfig {
    /// Plain HTTP address. Port 0 picks an ephemeral port; the secure listener then uses the
    /// port after whichever one was bound.
    pub bind_addr: SocketAddr,
    pub root: PathBuf,
    /// Secrets file naming the PEM key and certificate. `None` disables HTTPS entirely.
    pub secrets: Option<PathBuf>,
}

struct SecureListener {
    addr: SocketAddr,
    handle: Handle,
    join: JoinHandle<anyhow::Result<()>>,
}

pub struct RunningAssetServer {
    plain_addr: SocketAddr,
    secure: Option<SecureListener>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<anyhow::Result<()>>>,
}

impl RunningAssetServer {
    pub fn plain_addr(&self) -> SocketAddr {
        self.plain_addr
    }

    /// `None` when the server runs plain HTTP only.
    pub fn secure_addr(&self) -> Option<SocketAddr> {
        self.secure.as_ref().map(|secure| secure.addr)
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(secure) = self.secure.take() {
            secure.handle.graceful_shutdown(Some(SECURE_SHUTDOWN_GRACE));
            secure.join.await.context("https server task panicked")??;
        }
        if let Some(join) = self.join.take() {
            join.await.context("http server task panicked")??;
        }
        Ok(())
    }
}

impl Drop for RunningAssetServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(secure) = self.secure.take() {
            secure.handle.shutdown();
            secure.join.abort();
        }
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Bind the plain listener (fatal on failure), then try the secure one (never fatal).
pub async fn start(config: AssetServerConfig) -> anyhow::Result<RunningAssetServer> {
    let app = crate::app(AppState::new(config.root.clone()));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    let plain_addr = listener.local_addr().context("read bound address")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let join = tokio::spawn({
        let app = app.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .context("serve http")?;
            Ok(())
        }
    });
    tracing::info!(
        "serving {} on http://{plain_addr}",
        config.root.display()
    );

    let secure = match &config.secrets {
        None => None,
        Some(secrets) => match start_secure(secrets, plain_addr, app).await {
            Ok(secure) => {
                tracing::info!("serving {} on https://{}", config.root.display(), secure.addr);
                Some(secure)
            }
            Err(err) => {
                tracing::warn!("HTTPS disabled, serving plain HTTP only: {err}");
                None
            }
        },
    };

    Ok(RunningAssetServer {
        plain_addr,
        secure,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

async fn start_secure(
    secrets: &std::path::Path,
    plain_addr: SocketAddr,
    app: Router,
) -> Result<SecureListener, TlsError> {
    let addr = tls::secure_addr(plain_addr)?;
    let config = TlsMaterial::load(secrets).await?.into_rustls_config().await?;

    let handle = Handle::new();
    let mut join = tokio::spawn({
        let handle = handle.clone();
        async move {
            axum_server::bind_rustls(addr, config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("serve https")
        }
    });

    // `listening` resolves to `None` if the server task ends before binding.
    match handle.listening().await {
        Some(addr) => Ok(SecureListener { addr, handle, join }),
        None => {
            let reason = match (&mut join).await {
                Ok(Err(err)) => format!("{err:#}"),
                Ok(Ok(())) => "listener exited".to_string(),
                Err(err) => err.to_string(),
            };
            Err(TlsError::Listen { addr, reason })
        }
    }
}
