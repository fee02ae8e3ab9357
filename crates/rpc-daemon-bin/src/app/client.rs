//! Client construction shared by the CLI commands.

use rpc_config_and_utils::{Config, Paths};
use rpc_ipc::RpcClient;

/// Client for the daemon under `paths`.
///
/// Uses `token` when given, otherwise the first configured token (which
/// includes `RPCD_AUTH_TOKEN` once the config is loaded).
pub fn daemon_client(paths: &Paths, config: &Config, token: Option<String>) -> RpcClient {
    let client = RpcClient::new(&paths.socket_file().to_string_lossy());
    match token.or_else(|| config.auth_tokens.first().cloned()) {
        Some(token) => client.with_token(token),
        None => client,
    }
}
