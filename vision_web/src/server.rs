use crate::{
    classifier::ImageClassifier,
    config::{Config, DisplayConfig, UploadConfig},
    routes::api_routes,
    session::SessionStore,
    telemetry::Metrics,
};
use axum::Router;
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub classifier: Arc<dyn ImageClassifier>,
    pub sessions: Arc<SessionStore>,
    pub upload_config: Arc<UploadConfig>,
    pub display_config: Arc<DisplayConfig>,
    pub metrics: Arc<Metrics>,
}

impl SharedState {
    pub fn new(classifier: Arc<dyn ImageClassifier>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            classifier,
            sessions: Arc::new(SessionStore::new(&config.sessions)),
            upload_config: Arc::new(config.upload.clone()),
            display_config: Arc::new(config.display.clone()),
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn build_router(state: SharedState) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes(&state.upload_config))
        .with_state(state)
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(
        classifier: Arc<dyn ImageClassifier>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let state = SharedState::new(classifier, config)?;
        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
