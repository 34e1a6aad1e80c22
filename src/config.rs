use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default per-file upload limit (5 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Ports browsers refuse to connect to. Binding one of them would leave the
/// drop unreachable from the browser client.
const BLOCKED_PORTS: &[u16] = &[
    1, 7, 9, 11, 13, 15, 17, 19, 20, 21, 22, 23, 25, 37, 42, 43, 53, 77, 79, 87, 95, 101, 102,
    103, 104, 109, 110, 111, 113, 115, 117, 119, 123, 135, 139, 143, 179, 389, 465, 512, 513, 514,
    515, 526, 530, 531, 532, 540, 556, 563, 587, 601, 636, 993, 995, 2049, 3659, 4045, 6000, 6665,
    6666, 6667, 6668, 6669, 6697,
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub storage_path: PathBuf,
    pub public_dir: PathBuf,
    pub max_file_size: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3006".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SERVER_PORT: {}", e))?,
            storage_path: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            public_dir: env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "public".to_string())
                .into(),
            max_file_size: match env::var("MAX_FILE_SIZE") {
                Ok(value) => value
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid MAX_FILE_SIZE: {}", e))?,
                Err(_) => DEFAULT_MAX_FILE_SIZE,
            },
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must not be 0"));
        }
        if is_blocked_port(self.server_port) {
            return Err(anyhow::anyhow!(
                "Port {} is blocked by browsers; use one of 3000, 8080, 8000, 5000, 4000",
                self.server_port
            ));
        }
        if self.max_file_size == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE must be greater than 0"));
        }
        Ok(())
    }
}

pub fn is_blocked_port(port: u16) -> bool {
    BLOCKED_PORTS.contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: u16) -> Config {
        Config {
            server_port: port,
            storage_path: "uploads".into(),
            public_dir: "public".into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    #[test]
    fn test_default_port_is_allowed() {
        assert!(config(3006).validate().is_ok());
    }

    #[test]
    fn test_blocked_ports_are_rejected() {
        for port in [22, 6000, 6667] {
            let err = config(port).validate().unwrap_err();
            assert!(err.to_string().contains("blocked"), "port {port}: {err}");
        }
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(config(0).validate().is_err());

        let mut cfg = config(8080);
        cfg.max_file_size = 0;
        assert!(cfg.validate().is_err());
    }
}
