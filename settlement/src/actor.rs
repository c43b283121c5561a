//! Single-writer actor for async callers
//!
//! Async services talk to the protocol through a [`ProtocolHandle`];
//! every command lands in one bounded mailbox and is executed by a
//! single task, so mutations are applied strictly in arrival order.
//!
//! ```text
//! ProtocolHandle (Clone) ──mpsc (bounded)──▶ ProtocolActor ──▶ Protocol
//!        ▲                                        │
//!        └──────────────── oneshot ◀──────────────┘
//! ```

use crate::{
    health::HealthReport,
    propagation::InjectionReceipt,
    protocol::Protocol,
    Error, Result,
};
use field_graph::BondId;
use ledger_core::{InstrumentId, NodeId, RedemptionChannel, Totals};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Command sent to the protocol actor
#[derive(Debug)]
pub enum ProtocolCommand {
    /// Register a node
    RegisterNode {
        /// Node id
        id: NodeId,
        /// `false` if it already existed
        response: Reply<bool>,
    },

    /// Form a bond
    FormBond {
        /// One endpoint
        a: NodeId,
        /// Other endpoint
        b: NodeId,
        /// Bond id
        response: Reply<BondId>,
    },

    /// Dissolve a bond
    DissolveBond {
        /// One endpoint
        a: NodeId,
        /// Other endpoint
        b: NodeId,
        /// Bond id
        response: Reply<BondId>,
    },

    /// Inject and propagate cash
    Inject {
        /// Origin node
        origin: NodeId,
        /// Injected amount
        amount: Decimal,
        /// Receipt
        response: Reply<InjectionReceipt>,
    },

    /// Mint an instrument
    Mint {
        /// Holder
        holder: NodeId,
        /// Locked amount
        amount: Decimal,
        /// Locking rate
        rate: Decimal,
        /// Instrument id
        response: Reply<InstrumentId>,
    },

    /// Redeem an instrument
    Redeem {
        /// Instrument
        id: InstrumentId,
        /// Payout channel
        channel: RedemptionChannel,
        /// Amount paid out
        response: Reply<Decimal>,
    },

    /// Cancel an instrument
    Cancel {
        /// Instrument
        id: InstrumentId,
        /// Amount returned
        response: Reply<Decimal>,
    },

    /// Read net totals
    Totals {
        /// Totals
        response: Reply<Totals>,
    },

    /// Read the health report
    Health {
        /// Report
        response: Reply<HealthReport>,
    },

    /// Stop after draining earlier commands
    Shutdown,
}

/// Actor that owns the write path
#[derive(Debug)]
pub struct ProtocolActor {
    protocol: Arc<Protocol>,
    mailbox: mpsc::Receiver<ProtocolCommand>,
}

impl ProtocolActor {
    /// Create new actor
    pub fn new(protocol: Arc<Protocol>, mailbox: mpsc::Receiver<ProtocolCommand>) -> Self {
        Self { protocol, mailbox }
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Protocol actor started");

        while let Some(command) = self.mailbox.recv().await {
            if matches!(command, ProtocolCommand::Shutdown) {
                break;
            }
            self.handle(command);
        }

        tracing::info!("Protocol actor stopped");
    }

    fn handle(&self, command: ProtocolCommand) {
        let protocol = &self.protocol;

        // a dropped receiver only means the caller stopped waiting
        match command {
            ProtocolCommand::RegisterNode { id, response } => {
                let _ = response.send(Ok(protocol.register_node(id)));
            }
            ProtocolCommand::FormBond { a, b, response } => {
                let _ = response.send(protocol.form_bond(&a, &b));
            }
            ProtocolCommand::DissolveBond { a, b, response } => {
                let _ = response.send(protocol.dissolve_bond(&a, &b));
            }
            ProtocolCommand::Inject {
                origin,
                amount,
                response,
            } => {
                let _ = response.send(protocol.inject(&origin, amount));
            }
            ProtocolCommand::Mint {
                holder,
                amount,
                rate,
                response,
            } => {
                let _ = response.send(protocol.mint(&holder, amount, rate));
            }
            ProtocolCommand::Redeem {
                id,
                channel,
                response,
            } => {
                let result = protocol.redeem(&id, channel);
                if let Err(e) = &result {
                    if e.kind().is_fatal() {
                        tracing::error!(instrument = %id, error = %e, "Redemption failed");
                    }
                }
                let _ = response.send(result);
            }
            ProtocolCommand::Cancel { id, response } => {
                let _ = response.send(protocol.cancel(&id));
            }
            ProtocolCommand::Totals { response } => {
                let _ = response.send(Ok(protocol.totals()));
            }
            ProtocolCommand::Health { response } => {
                let _ = response.send(Ok(protocol.health()));
            }
            ProtocolCommand::Shutdown => {}
        }
    }
}

/// Cloneable handle to the protocol actor
#[derive(Debug, Clone)]
pub struct ProtocolHandle {
    sender: mpsc::Sender<ProtocolCommand>,
}

impl ProtocolHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<ProtocolCommand>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> ProtocolCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Register a node
    pub async fn register_node(&self, id: NodeId) -> Result<bool> {
        self.request(|response| ProtocolCommand::RegisterNode { id, response })
            .await
    }

    /// Form a bond
    pub async fn form_bond(&self, a: NodeId, b: NodeId) -> Result<BondId> {
        self.request(|response| ProtocolCommand::FormBond { a, b, response })
            .await
    }

    /// Dissolve a bond
    pub async fn dissolve_bond(&self, a: NodeId, b: NodeId) -> Result<BondId> {
        self.request(|response| ProtocolCommand::DissolveBond { a, b, response })
            .await
    }

    /// Inject and propagate cash
    pub async fn inject(&self, origin: NodeId, amount: Decimal) -> Result<InjectionReceipt> {
        self.request(|response| ProtocolCommand::Inject {
            origin,
            amount,
            response,
        })
        .await
    }

    /// Mint an instrument
    pub async fn mint(&self, holder: NodeId, amount: Decimal, rate: Decimal) -> Result<InstrumentId> {
        self.request(|response| ProtocolCommand::Mint {
            holder,
            amount,
            rate,
            response,
        })
        .await
    }

    /// Redeem an instrument
    pub async fn redeem(&self, id: InstrumentId, channel: RedemptionChannel) -> Result<Decimal> {
        self.request(|response| ProtocolCommand::Redeem {
            id,
            channel,
            response,
        })
        .await
    }

    /// Cancel an instrument
    pub async fn cancel(&self, id: InstrumentId) -> Result<Decimal> {
        self.request(|response| ProtocolCommand::Cancel { id, response })
            .await
    }

    /// Net totals
    pub async fn totals(&self) -> Result<Totals> {
        self.request(|response| ProtocolCommand::Totals { response })
            .await
    }

    /// Health report
    pub async fn health(&self) -> Result<HealthReport> {
        self.request(|response| ProtocolCommand::Health { response })
            .await
    }

    /// Ask the actor to stop once earlier commands are done
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ProtocolCommand::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }
}

/// Spawn the protocol actor on the current tokio runtime
pub fn spawn_protocol_actor(
    protocol: Arc<Protocol>,
    capacity: usize,
) -> (ProtocolHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let actor = ProtocolActor::new(protocol, rx);
    let task = tokio::spawn(actor.run());
    (ProtocolHandle::new(tx), task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use ledger_core::ProtocolConfig;

    fn n(id: &str) -> NodeId {
        NodeId::new(id)
    }

    #[tokio::test]
    async fn test_commands_run_in_order() {
        let protocol =
            Arc::new(Protocol::with_system_clock(Arc::new(ProtocolConfig::default())).unwrap());
        let (handle, task) = spawn_protocol_actor(protocol.clone(), 8);

        assert!(handle.register_node(n("a")).await.unwrap());
        assert!(handle.register_node(n("b")).await.unwrap());
        handle.form_bond(n("a"), n("b")).await.unwrap();

        let receipt = handle.inject(n("a"), Decimal::from(100)).await.unwrap();
        assert_eq!(receipt.allocation.settled(), Decimal::new(225, 1));

        let err = handle.form_bond(n("a"), n("a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SelfBond);

        let totals = handle.totals().await.unwrap();
        assert!(totals.is_balanced());
        assert_eq!(totals, protocol.totals());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_injection_keeps_actor_alive() {
        let protocol =
            Arc::new(Protocol::with_system_clock(Arc::new(ProtocolConfig::default())).unwrap());
        let (handle, task) = spawn_protocol_actor(protocol, 4);
        handle.register_node(n("a")).await.unwrap();

        let huge: Decimal = "50000000000000000000000000000".parse().unwrap();
        for _ in 0..2 {
            let err = handle.inject(n("a"), huge).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        let totals = handle.totals().await.unwrap();
        assert_eq!(totals.inflow, Decimal::ZERO);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_mailbox_is_concurrency_error() {
        let protocol =
            Arc::new(Protocol::with_system_clock(Arc::new(ProtocolConfig::default())).unwrap());
        let (handle, task) = spawn_protocol_actor(protocol, 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let err = handle.register_node(n("a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(err, Error::Concurrency(_)));
    }
}
