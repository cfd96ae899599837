//! Command line configuration for the gateway server.

use clap::Parser;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "gateway")]
#[command(about = "Measurement ingestion gateway")]
pub struct CliArgs {
    /// Path to the gateway YAML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "GATEWAY_PORT")]
    pub port: u16,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct GatewayServerConfig {
    pub port: u16,
}

impl Default for GatewayServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl From<&CliArgs> for GatewayServerConfig {
    fn from(args: &CliArgs) -> Self {
        Self { port: args.port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_cli_args() {
        // given
        let argv = ["gateway", "--config", "gateway.yaml", "--port", "6012"];

        // when
        let args = CliArgs::try_parse_from(argv).unwrap();

        // then
        assert_eq!(args.config.as_deref(), Some("gateway.yaml"));
        assert_eq!(GatewayServerConfig::from(&args).port, 6012);
    }
}
