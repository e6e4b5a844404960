// External-hook gRPC service: answers EMQX's publish-admission hook. Only
// OnMessagePublish carries logic; every other hook is a no-op / CONTINUE
// (spec §4.G).

mod filter;

use std::time::Duration;

use tonic::{transport::Server, Request, Response, Status};
use tracing::{debug, info, warn};

use bridger_core::config::Config;
use filter::MessageFilter;

pub mod exhook {
    tonic::include_proto!("emqx.exhook.v2");
}

use exhook::{
    hook_provider_server::{HookProvider, HookProviderServer},
    valued_response::ResponsedType,
    *,
};

struct BridgerExHook {
    filter: MessageFilter,
}

#[tonic::async_trait]
impl HookProvider for BridgerExHook {
    async fn on_provider_loaded(&self, request: Request<ProviderLoadedRequest>) -> Result<Response<LoadedResponse>, Status> {
        let broker = request.into_inner().broker;
        info!(?broker, "exhook provider loaded");
        Ok(Response::new(LoadedResponse {
            hooks: vec![HookSpec {
                name: "message.publish".into(),
                topics: vec![],
            }],
        }))
    }

    async fn on_provider_unloaded(&self, _request: Request<ProviderUnloadedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }

    async fn on_client_connect(&self, _request: Request<ClientConnectRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_client_connack(&self, _request: Request<ClientConnackRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_client_connected(&self, _request: Request<ClientConnectedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_client_disconnected(&self, _request: Request<ClientDisconnectedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }

    async fn on_client_authenticate(&self, _request: Request<ClientAuthenticateRequest>) -> Result<Response<ValuedResponse>, Status> {
        Ok(Response::new(ValuedResponse {
            r#type: ResponsedType::Continue as i32,
            message: None,
            bool_result: false,
        }))
    }

    async fn on_client_authorize(&self, _request: Request<ClientAuthorizeRequest>) -> Result<Response<ValuedResponse>, Status> {
        Ok(Response::new(ValuedResponse {
            r#type: ResponsedType::Continue as i32,
            message: None,
            bool_result: false,
        }))
    }

    async fn on_client_subscribe(&self, _request: Request<ClientSubscribeRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_client_unsubscribe(&self, _request: Request<ClientUnsubscribeRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }

    async fn on_session_created(&self, _request: Request<SessionCreatedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_subscribed(&self, _request: Request<SessionSubscribedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_unsubscribed(&self, _request: Request<SessionUnsubscribedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_resumed(&self, _request: Request<SessionResumedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_discarded(&self, _request: Request<SessionDiscardedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_takenover(&self, _request: Request<SessionTakenoverRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_session_terminated(&self, _request: Request<SessionTerminatedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }

    async fn on_message_publish(&self, request: Request<MessagePublishRequest>) -> Result<Response<ValuedResponse>, Status> {
        let message = request
            .into_inner()
            .message
            .ok_or_else(|| Status::invalid_argument("missing message"))?;

        let username = message.headers.get("username").cloned().unwrap_or_default();
        debug!(topic = %message.topic, %username, "processing message publish");

        let allow = self.filter.should_allow_publish(&username);

        let mut headers = message.headers.clone();
        headers.insert("allow_publish".into(), allow.to_string());

        let filtered = Message { headers, ..message };

        Ok(Response::new(ValuedResponse {
            r#type: ResponsedType::StopAndReturn as i32,
            message: Some(filtered),
            bool_result: false,
        }))
    }

    async fn on_message_delivered(&self, _request: Request<MessageDeliveredRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_message_dropped(&self, _request: Request<MessageDroppedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
    async fn on_message_acked(&self, _request: Request<MessageAckedRequest>) -> Result<Response<EmptySuccess>, Status> {
        Ok(Response::new(EmptySuccess {}))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "bridger_exhook=info".into()))
        .json()
        .init();

    let config = Config::from_env();
    let addr = format!("{}:{}", config.exhook.host, config.exhook.port).parse()?;
    info!(%addr, allowed_users = ?config.exhook.allowed_users, "starting exhook server");

    let servicer = BridgerExHook {
        filter: MessageFilter::new(config.exhook.allowed_users.clone()),
    };

    // The shutdown future resolves as soon as the signal arrives, so the
    // server stops accepting new connections immediately; the 5s grace
    // period only bounds how long we wait for in-flight RPCs to drain.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(
        Server::builder()
            .add_service(HookProviderServer::new(servicer))
            .serve_with_shutdown(addr, async {
                shutdown_rx.await.ok();
            }),
    );

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, stopping new connections");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(Ok(()))) => info!("drained in-flight requests, exiting"),
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => warn!("grace period elapsed before all in-flight requests finished, exiting anyway"),
    }

    Ok(())
}
