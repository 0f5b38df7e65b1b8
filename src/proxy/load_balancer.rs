use std::net::SocketAddr;
use std::sync::Arc;

use color_eyre::eyre::Result;
use notify::RecommendedWatcher;
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::configuration::{ConfigSource, Settings};
use crate::proxy::pool::Pool;

pub struct LoadBalancer {
    pub listen_addr: SocketAddr,
    pub pool: Arc<RwLock<Pool>>,
    rx: Option<UnboundedReceiver<Settings>>,
    _watcher: Option<RecommendedWatcher>,
}

impl LoadBalancer {
    /// Build the pool from `config` and start watching the configuration
    /// layers named by `$RUN_MODE` for membership changes.
    pub fn new(config: Settings) -> Result<Self> {
        Self::with_source(config, &ConfigSource::from_env())
    }

    pub fn with_source(config: Settings, source: &ConfigSource) -> Result<Self> {
        let (watcher, rx) = source.watch()?;
        let mut balancer = Self::without_reload(config)?;
        balancer.rx = Some(rx);
        balancer._watcher = Some(watcher);
        Ok(balancer)
    }

    /// A balancer whose pool only changes through [`LoadBalancer::update`].
    pub fn without_reload(config: Settings) -> Result<Self> {
        let pool = Pool::new(&config)?;
        info!(
            algorithm = ?config.algorithm,
            backends = pool.nodes().len(),
            "Built backend pool"
        );

        Ok(Self {
            listen_addr: config.listen_addr,
            pool: Arc::new(RwLock::new(pool)),
            rx: None,
            _watcher: None,
        })
    }

    #[tracing::instrument(name = "Update configuration", skip_all, err(Debug))]
    pub async fn update(&self, settings: Settings) -> Result<()> {
        let mut pool = self.pool.write().await;
        pool.update(&settings)?;
        Ok(())
    }

    #[tracing::instrument(name = "Sync configuration", skip_all)]
    pub async fn config_sync(&mut self) -> Result<()> {
        let Some(mut rx) = self.rx.take() else {
            return Ok(());
        };

        while let Some(new_config) = rx.recv().await {
            info!("New load balancing algorithm: {:?}", new_config.algorithm);
            info!("Backend servers {:?}", new_config.backends);
            if new_config.listen_addr != self.listen_addr {
                warn!(
                    "Ignoring listen address change to {}; restart to apply",
                    new_config.listen_addr
                );
            }
            // a bad reload keeps serving with the previous pool
            if let Err(e) = self.update(new_config).await {
                error!("Rejected configuration reload: {}", e);
            }
        }

        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Listening on {}", self.listen_addr);
        let listener: TcpListener = TcpListener::bind(self.listen_addr).await?;

        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = run_server(listener, pool).await {
                error!("Error running proxy server {:?}", e);
            }
        });
        self.config_sync().await?;

        // no reload channel: keep serving until the process is stopped
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub async fn run_server(lb_listener: TcpListener, pool: Arc<RwLock<Pool>>) -> Result<()> {
    loop {
        let (client_stream, client_addr) = lb_listener.accept().await?;
        let pool = pool.clone();

        tokio::spawn(async move {
            // the guard holds the node's connection count until the splice ends
            let guard = match pool.read().await.get_next() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("Dropping connection from {}: {}", client_addr, e);
                    return;
                }
            };
            let backend_addr = guard.addr;

            info!("Forwarding connection to {}", backend_addr);

            match handle_connection(client_stream, backend_addr).await {
                Ok(_) => info!("Connection to {} closed", backend_addr),
                Err(e) => error!("Error handling connection to {}: {:?}", backend_addr, e),
            }

            drop(guard);
        });
    }
}

async fn handle_connection(mut client_stream: TcpStream, backend_addr: SocketAddr) -> Result<()> {
    let mut backend_stream = TcpStream::connect(backend_addr).await?;

    let (from_client, from_server) =
        copy_bidirectional(&mut client_stream, &mut backend_stream).await?;
    tracing::info!(
        "Client wrote {} bytes and received {} bytes",
        from_client,
        from_server
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::BackendSettings;
    use crate::selection_method::LoadBalancingAlgorithm;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_echo_backend() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        let n = stream.read(&mut buf).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        stream.write_all(&buf[..n]).await.unwrap();
                    }
                });
            }
        });
        addr
    }

    fn settings(backends: Vec<BackendSettings>) -> Settings {
        Settings {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            backends,
            algorithm: LoadBalancingAlgorithm::LeastConnection,
            weight_decrement: 1.0,
        }
    }

    #[tokio::test]
    async fn forwards_and_releases_connection() {
        let backend_addr = spawn_echo_backend().await;
        let balancer = LoadBalancer::without_reload(settings(vec![BackendSettings {
            name: "echo".into(),
            addr: backend_addr,
            weight: 1.0,
        }]))
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();
        tokio::spawn(run_server(listener, balancer.pool.clone()));

        let mut client = TcpStream::connect(proxy_addr).await.unwrap();
        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        let node = balancer.pool.read().await.nodes()[0].clone();
        assert_eq!(node.connections(), 1);

        drop(client);
        for _ in 0..100 {
            if node.connections() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(node.connections(), 0);
    }

    const DEVELOPMENT_LAYER: &str = r#"
        listen_addr = "127.0.0.1:3000"

        [[backends]]
        name = "a"
        addr = "127.0.0.1:8000"
        "#;

    #[tokio::test]
    async fn starts_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("development.toml"), DEVELOPMENT_LAYER).unwrap();
        let source = ConfigSource::new(dir.path(), "development");

        let balancer = LoadBalancer::with_source(source.load().unwrap(), &source).unwrap();
        assert_eq!(balancer.pool.read().await.nodes().len(), 1);
        assert!(balancer.rx.is_some());
    }

    #[tokio::test]
    async fn run_mode_layer_edit_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let layer = dir.path().join("development.toml");
        std::fs::write(&layer, DEVELOPMENT_LAYER).unwrap();
        let source = ConfigSource::new(dir.path(), "development");

        let mut balancer = LoadBalancer::with_source(source.load().unwrap(), &source).unwrap();
        let mut rx = balancer.rx.take().unwrap();

        std::fs::write(&layer, format!("algorithm = \"random\"\n{DEVELOPMENT_LAYER}")).unwrap();

        // partial writes may surface as failed loads first; wait for the full one
        let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(settings) if settings.algorithm == LoadBalancingAlgorithm::Random => {
                        break settings
                    }
                    Some(_) => continue,
                    None => panic!("watcher stopped"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reloaded.backends.len(), 1);
    }

    #[tokio::test]
    async fn empty_pool_drops_client() {
        let balancer = LoadBalancer::without_reload(settings(vec![])).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();
        tokio::spawn(run_server(listener, balancer.pool.clone()));

        let mut client = TcpStream::connect(proxy_addr).await.unwrap();
        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn update_applies_new_membership() {
        let balancer = LoadBalancer::without_reload(settings(vec![])).unwrap();
        balancer
            .update(settings(vec![BackendSettings {
                name: "a".into(),
                addr: "127.0.0.1:8000".parse().unwrap(),
                weight: 2.0,
            }]))
            .await
            .unwrap();

        let pool = balancer.pool.read().await;
        assert_eq!(pool.nodes().len(), 1);
        assert_eq!(pool.get_next().unwrap().name, "a");
    }
}
