use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Args;

use crate::server::AssetServerConfig;
use crate::DEFAULT_PORT;

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Plain HTTP port. HTTPS, when enabled, listens on the port after it.
    ///
    /// Environment variable: `RAYLINK_PORT`.
    #[arg(long, env = "RAYLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind both listeners on.
    ///
    /// Environment variable: `RAYLINK_BIND`.
    #[arg(long, env = "RAYLINK_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Directory served as the web root.
    ///
    /// Environment variable: `RAYLINK_WEB_ROOT`.
    #[arg(long, env = "RAYLINK_WEB_ROOT", default_value = "dist")]
    pub root: PathBuf,

    /// JSON file naming the TLS key and certificate PEM files.
    ///
    /// Environment variable: `RAYLINK_SECRETS`.
    #[arg(long, env = "RAYLINK_SECRETS", default_value = "web/secrets.json")]
    pub secrets: PathBuf,

    /// Serve plain HTTP only, without looking for key material.
    #[arg(long, env = "RAYLINK_NO_TLS")]
    pub no_tls: bool,
}

impl ServeArgs {
    pub fn into_config(self) -> AssetServerConfig {
        AssetServerConfig {
            bind_addr: SocketAddr::new(self.bind, self.port),
            root: self.root,
            secrets: (!self.no_tls).then_some(self.secrets),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn defaults_match_the_dev_layout() {
        let config = Cli::parse_from(["raylink"]).serve.into_config();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.root, PathBuf::from("dist"));
        assert_eq!(config.secrets, Some(PathBuf::from("web/secrets.json")));
    }

    #[test]
    fn no_tls_drops_the_secrets_path() {
        let config = Cli::parse_from(["raylink", "--port", "9000", "--no-tls"])
            .serve
            .into_config();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.secrets, None);
    }
}
