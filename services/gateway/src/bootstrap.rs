//! Component wiring

use crate::config::{Config, ANCHOR_NODE_SERVICE};
use crate::error::Error;
use crate::AppState;
use adapters::mobile_money::MOBILE_MONEY_PROVIDER;
use adapters::sepa::SEPA_PROVIDER;
use adapters::{MobileMoneyConnector, PaymentRouter, RailConnector, SepaInstantConnector};
use ledger_core::{AnchorLedger, AnchorService, JsonRpcAnchorClient, LocalAnchorLedger};
use message_bus::{EventPublisher, LogPublisher, NatsPublisher, Notifier};
use protocol_core::SharedClock;
use resilience::ServiceRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Built components plus the background notification task
#[derive(Debug)]
pub struct Services {
    /// Handler state
    pub state: AppState,
    /// Notification delivery; finishes once every notifier handle is dropped
    pub notifier_task: JoinHandle<()>,
}

/// Build every component from `config`
pub async fn build(config: &Config, clock: SharedClock) -> Result<Services, Error> {
    let publisher: Arc<dyn EventPublisher> = match &config.bus.publisher.url {
        Some(url) => {
            info!("Connecting to NATS: {}", url);
            Arc::new(NatsPublisher::connect(config.bus.publisher.clone()).await?)
        }
        None => {
            info!("No NATS URL configured, events will only be logged");
            Arc::new(LogPublisher)
        }
    };
    let (notifier, notifier_task) = Notifier::spawn(publisher, config.bus.queue_capacity);

    let registry = ServiceRegistry::from_configs(config.service_configs(), clock.clone())?;

    let mut router = PaymentRouter::new().with_notifier(notifier.clone());
    if config.rails.sepa.enabled {
        let connector = match registry.get(SEPA_PROVIDER) {
            Ok(client) => SepaInstantConnector::remote(client),
            Err(_) => SepaInstantConnector::sandbox(),
        };
        router.register(Arc::new(connector) as Arc<dyn RailConnector>)?;
    }
    if config.rails.mobile_money.enabled {
        let connector = match registry.get(MOBILE_MONEY_PROVIDER) {
            Ok(client) => MobileMoneyConnector::remote(client),
            Err(_) => MobileMoneyConnector::sandbox(),
        };
        router.register(Arc::new(connector) as Arc<dyn RailConnector>)?;
    }

    let ledger: Arc<dyn AnchorLedger> = match registry.get(ANCHOR_NODE_SERVICE) {
        Ok(client) => Arc::new(JsonRpcAnchorClient::new(client, config.anchor.clone())),
        Err(_) => {
            info!("No anchor RPC URL configured, using the local ledger");
            Arc::new(LocalAnchorLedger::new(clock.clone()))
        }
    };
    let anchor = AnchorService::new(ledger, config.anchor.clone(), clock).with_notifier(notifier);

    Ok(Services {
        state: AppState {
            router: Arc::new(router),
            anchor: Arc::new(anchor),
            registry: Arc::new(registry),
        },
        notifier_task,
    })
}
