use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// History slice returned when the client does not ask for a size.
    pub default_history_limit: usize,
    /// Hard cap on a single history request.
    pub max_history_limit: usize,
    /// Depth of each connection's outbound event buffer and of each room
    /// worker's send queue.
    pub queue_depth: usize,
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(3001),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            },
            chat: ChatConfig {
                default_history_limit: env::var("CHAT_HISTORY_LIMIT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(50),
                max_history_limit: env::var("CHAT_HISTORY_MAX_LIMIT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(200),
                queue_depth: env::var("CHAT_QUEUE_DEPTH")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(256),
            },
        }
    }
}
