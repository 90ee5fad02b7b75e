use serde::Deserialize;

/// Top-level server configuration, loaded from `netpong.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub game: GameConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            web_root: "frontend/dist".to_string(),
            game: GameConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Tick loop timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate_hz: u32,
    /// Upper bound on the simulated step, in milliseconds.
    pub max_dt_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            max_dt_ms: 50,
        }
    }
}

impl GameConfig {
    pub fn max_dt_secs(&self) -> f32 {
        self.max_dt_ms as f32 / 1000.0
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Outbound snapshot queue per session. A session whose queue is full
    /// is treated as broken and dropped.
    pub session_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            session_buffer: 64,
            ws_rate_limit_per_sec: 60.0,
        }
    }
}

impl ServerConfig {
    /// Collect every validation problem. An empty list means the config is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.game.tick_rate_hz == 0 || self.game.tick_rate_hz > 1000 {
            problems.push("game.tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.game.max_dt_ms == 0 {
            problems.push("game.max_dt_ms must be > 0".to_string());
        }
        if self.limits.max_ws_connections == 0 {
            problems.push("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.session_buffer == 0 {
            problems.push("limits.session_buffer must be > 0".to_string());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            problems.push("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        problems
    }

    /// Validate configuration, exiting the process on unusable values.
    pub fn validate(&self) {
        let problems = self.problems();
        for problem in &problems {
            tracing::error!("{problem}");
        }
        if !problems.is_empty() {
            std::process::exit(1);
        }
        if self.game.max_dt_secs() > netpong_core::sim::config::MAX_DT {
            tracing::warn!(
                max_dt_ms = self.game.max_dt_ms,
                "game.max_dt_ms exceeds the simulation limit, steps will be capped at {} ms",
                (netpong_core::sim::config::MAX_DT * 1000.0) as u64
            );
        }
    }

    /// Load config from `netpong.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("netpong.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from netpong.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse netpong.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No netpong.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("NETPONG_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("NETPONG_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(val) = std::env::var("NETPONG_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            config.game.tick_rate_hz = n;
        }
        if let Ok(val) = std::env::var("NETPONG_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }

        config
    }
}
