//! Bootstrap behaviour with stub drivers and tunnels
//!
//! The stubs record every call so each test can assert which endpoint the
//! driver saw and whether a tunnel was opened at all.

use async_trait::async_trait;
use dbtunnel_client::{
    AuthMaterial, BackendDriver, Bootstrap, BootstrapError, ClientRegistry, DriverError, Endpoint,
    Strategy, TunnelDescriptor, TunnelError, TunnelEstablisher, TunnelFailure, ValidationError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, PartialEq, Eq)]
struct StubClient {
    id: usize,
    endpoint: Endpoint,
}

#[derive(Clone, Copy)]
enum DriverOutcome {
    Connect,
    RejectAuth,
}

struct StubDriver {
    outcome: DriverOutcome,
    calls: Mutex<Vec<(Endpoint, AuthMaterial)>>,
    next_id: AtomicUsize,
}

impl StubDriver {
    fn new(outcome: DriverOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        })
    }

    fn calls(&self) -> Vec<(Endpoint, AuthMaterial)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendDriver for StubDriver {
    type Client = StubClient;

    fn name(&self) -> &str {
        "stub backend"
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        auth: &AuthMaterial,
    ) -> Result<StubClient, DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.clone(), auth.clone()));

        match self.outcome {
            DriverOutcome::Connect => Ok(StubClient {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                endpoint: endpoint.clone(),
            }),
            DriverOutcome::RejectAuth => Err(DriverError::Authentication(
                "SCRAM authentication failed".to_string(),
            )),
        }
    }
}

struct StubTunnel {
    refuse: bool,
    calls: Mutex<Vec<TunnelDescriptor>>,
}

impl StubTunnel {
    fn new(refuse: bool) -> Arc<Self> {
        Arc::new(Self {
            refuse,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<TunnelDescriptor> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TunnelEstablisher for StubTunnel {
    async fn open(&self, descriptor: &TunnelDescriptor) -> Result<u16, TunnelError> {
        self.calls.lock().unwrap().push(descriptor.clone());

        if self.refuse {
            let cause = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
            return Err(TunnelError::new(
                descriptor,
                TunnelFailure::Unreachable(cause),
            ));
        }
        Ok(descriptor.local_port)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn bootstrap(
    driver: &Arc<StubDriver>,
    tunnel: &Arc<StubTunnel>,
) -> Bootstrap<Arc<StubDriver>, Arc<StubTunnel>> {
    Bootstrap::new(driver.clone()).with_tunnel_establisher(tunnel.clone())
}

fn scenario_a() -> Value {
    json!({
        "environment": "local",
        "tunnel": false,
        "backend_host": "db",
        "backend_port": 9200,
    })
}

fn scenario_b() -> Value {
    json!({
        "environment": "remote",
        "tunnel": true,
        "bastion_host": "bastion",
        "bastion_port": 22,
        "bastion_user": "ec2-user",
        "bastion_private_key": "<pem>",
        "cluster_host": "cluster.internal",
        "cluster_port": 27017,
        "local_forward_port": 27018,
    })
}

#[tokio::test]
async fn test_scenario_a_local_direct() {
    init_tracing();
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let status = bootstrap.init(&scenario_a()).await.unwrap();

    assert_eq!(status.strategy, Strategy::Direct);
    assert_eq!(status.to_string(), "Connected to stub backend at db:9200.");
    assert_eq!(driver.calls()[0].0, Endpoint::new("db", 9200));
    assert!(tunnel.calls().is_empty());

    let client = bootstrap.client().expect("registry should be set");
    assert_eq!(client.endpoint, Endpoint::new("db", 9200));
}

#[tokio::test]
async fn test_scenario_b_tunnel_refused() {
    init_tracing();
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(true);
    let bootstrap = bootstrap(&driver, &tunnel);

    let err = bootstrap.init(&scenario_b()).await.unwrap_err();

    match err {
        BootstrapError::Tunnel(ref tunnel_err) => {
            assert!(matches!(
                tunnel_err.cause,
                TunnelFailure::Unreachable(ref io) if io.kind() == std::io::ErrorKind::ConnectionRefused
            ));
            assert_eq!(tunnel_err.descriptor.bastion_host, "bastion");
            assert_eq!(tunnel_err.descriptor.remote_host, "cluster.internal");
        }
        other => panic!("expected tunnel error, got {:?}", other),
    }
    assert_eq!(tunnel.calls().len(), 1);
    assert!(driver.calls().is_empty());
    assert!(bootstrap.client().is_none());
}

#[tokio::test]
async fn test_scenario_c_driver_rejects_auth() {
    init_tracing();
    let driver = StubDriver::new(DriverOutcome::RejectAuth);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let err = bootstrap.init(&scenario_b()).await.unwrap_err();

    match err {
        BootstrapError::Connection(ref conn_err) => {
            assert!(matches!(conn_err.source, DriverError::Authentication(_)));
            assert_eq!(conn_err.endpoint, Endpoint::new("localhost", 27018));
            assert_eq!(conn_err.backend, "stub backend");
        }
        other => panic!("expected connection error, got {:?}", other),
    }
    assert_eq!(tunnel.calls().len(), 1);
    assert!(bootstrap.client().is_none());
}

#[tokio::test]
async fn test_tunneled_driver_sees_local_forward() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let status = bootstrap.init(&scenario_b()).await.unwrap();

    assert_eq!(status.strategy, Strategy::Tunneled);
    assert_eq!(status.bastion, Some(Endpoint::new("bastion", 22)));
    assert_eq!(driver.calls()[0].0, Endpoint::new("localhost", 27018));

    let calls = tunnel.calls();
    let descriptor = &calls[0];
    assert_eq!(descriptor.remote(), Endpoint::new("cluster.internal", 27017));
    assert_eq!(descriptor.local_port, 27018);
    assert_eq!(descriptor.bastion_user, "ec2-user");
}

#[tokio::test]
async fn test_forward_host_override() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let mut options = scenario_b();
    options["forward_host"] = json!("docdb.cluster.internal");
    bootstrap.init(&options).await.unwrap();

    assert_eq!(
        driver.calls()[0].0,
        Endpoint::new("docdb.cluster.internal", 27018)
    );
}

#[tokio::test]
async fn test_remote_direct_passes_auth_material() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let options = json!({
        "environment": "remote",
        "tunnel": false,
        "cluster_host": "cluster.internal",
        "cluster_port": 27017,
        "credentials": { "username": "admin", "password": "pw" },
        "tls_ca": "-----BEGIN CERTIFICATE-----",
    });
    bootstrap.init(&options).await.unwrap();

    let calls = driver.calls();
    let (endpoint, auth) = &calls[0];
    assert_eq!(endpoint, &Endpoint::new("cluster.internal", 27017));
    assert_eq!(auth.credentials.as_ref().unwrap().username, "admin");
    assert!(auth.tls_ca.is_some());
    assert!(tunnel.calls().is_empty());
}

#[tokio::test]
async fn test_missing_field_rejected_before_io() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    for field in ["bastion_private_key", "cluster_port", "local_forward_port"] {
        let mut options = scenario_b();
        options.as_object_mut().unwrap().remove(field);

        let err = bootstrap.init(&options).await.unwrap_err();
        match err {
            BootstrapError::Validation(ValidationError::MissingField { field: ref missing }) => {
                assert_eq!(missing, field)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    assert!(tunnel.calls().is_empty());
    assert!(driver.calls().is_empty());
    assert!(!bootstrap.registry().is_initialized());
}

#[tokio::test]
async fn test_invalid_options_fail_identically_twice() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    let options = json!({ "environment": "local", "tunnel": false, "backend_host": "db" });

    let first = bootstrap.init(&options).await.unwrap_err();
    let second = bootstrap.init(&options).await.unwrap_err();

    match (first, second) {
        (BootstrapError::Validation(a), BootstrapError::Validation(b)) => {
            assert_eq!(a, b);
            assert_eq!(a.field(), Some("backend_port"));
        }
        other => panic!("expected two validation errors, got {:?}", other),
    }
    assert!(bootstrap.client().is_none());
}

#[tokio::test]
async fn test_last_successful_init_wins() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = bootstrap(&driver, &tunnel);

    bootstrap.init(&scenario_a()).await.unwrap();
    let first = bootstrap.client().unwrap();

    let mut second_options = scenario_a();
    second_options["backend_host"] = json!("db-2");
    bootstrap.init(&second_options).await.unwrap();
    let second = bootstrap.client().unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.endpoint, Endpoint::new("db-2", 9200));
}

#[tokio::test]
async fn test_failure_keeps_previous_client() {
    let registry = Arc::new(ClientRegistry::new());
    let tunnel = StubTunnel::new(true);

    let working = StubDriver::new(DriverOutcome::Connect);
    Bootstrap::with_registry(working.clone(), registry.clone())
        .init(&scenario_a())
        .await
        .unwrap();
    let before = registry.client().unwrap();

    let failing = Bootstrap::with_registry(working, registry.clone())
        .with_tunnel_establisher(tunnel.clone());
    assert!(failing.init(&scenario_b()).await.is_err());

    let after = registry.client().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_inits_leave_one_client() {
    let driver = StubDriver::new(DriverOutcome::Connect);
    let tunnel = StubTunnel::new(false);
    let bootstrap = Arc::new(bootstrap(&driver, &tunnel));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let bootstrap = bootstrap.clone();
            tokio::spawn(async move { bootstrap.init(&scenario_a()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(driver.calls().len(), 4);
    let client = bootstrap.client().unwrap();
    assert!((1..=4).contains(&client.id));
}
