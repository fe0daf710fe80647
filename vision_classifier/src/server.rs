use crate::{
    config::Config, gemini_service::GeminiModelService, inference_service::InferenceService,
    model_service::ModelService,
};
use tokio::signal;
use tonic::transport::server::Router;
use tonic::transport::Server;
use vision_proto::vision_service_server::VisionServiceServer;

pub struct GrpcServer {
    router: Router,
    addr: String,
}

impl GrpcServer {
    pub async fn new(
        model_service: impl ModelService,
        addr: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let inference_service = InferenceService::new(model_service);
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(vision_proto::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_service_status("vision_service.VisionService", tonic_health::ServingStatus::Serving)
            .await;

        let router = Server::builder()
            .add_service(health_service)
            .add_service(VisionServiceServer::new(inference_service))
            .add_service(reflection_service);

        Ok(Self {
            router,
            addr: addr.to_string(),
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr: std::net::SocketAddr = self.addr.parse()?;

        tracing::info!("Classifier service listening on {}", self.addr);

        let shutdown = async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown")
        };

        self.router.serve_with_shutdown(addr, shutdown).await?;
        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let model_service = GeminiModelService::new(&config.model, config.safety_settings.clone());

    let addr = config.server.get_address();
    let grpc_server = GrpcServer::new(model_service, &addr).await?;

    grpc_server.run().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
