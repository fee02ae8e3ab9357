//! `rpcd call`: send one request to the running daemon and print the response.

use super::client::daemon_client;
use clap::Args;
use rpc_config_and_utils::{Config, Paths};
use rpc_ipc::Request;
use rpc_protocol_types::DeferredTicket;
use serde_json::{Map, Value};

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Dotted function name, e.g. `util.add`
    pub function: String,

    /// Positional argument as JSON; bare words are sent as strings
    #[arg(short, long = "arg", value_name = "JSON")]
    pub args: Vec<String>,

    /// Named argument as `key=JSON`
    #[arg(short, long, value_name = "KEY=JSON")]
    pub named: Vec<String>,

    /// Ask the daemon to run the call in the background and return a handle
    #[arg(short, long)]
    pub deferred: bool,

    /// With --deferred, wait for the handle and print the final response
    #[arg(short, long, requires = "deferred")]
    pub wait: bool,

    /// Request token. Defaults to the first configured token.
    #[arg(short, long, env = "RPCD_AUTH_TOKEN")]
    pub token: Option<String>,
}

pub async fn call(
    paths: &Paths,
    config: &Config,
    args: CallArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = build_request(&args)?;
    let client = daemon_client(paths, config, args.token);

    let mut response = client.call(request).await?;

    if args.wait {
        if let Some(ticket) = DeferredTicket::from_response(&response) {
            eprintln!("Waiting for handle {}", ticket.handle);
            response = client.wait_handle(&ticket.handle).await?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_request(args: &CallArgs) -> Result<Request, Box<dyn std::error::Error>> {
    let positional = args.args.iter().map(|raw| parse_value(raw)).collect();

    let mut named = Map::new();
    for pair in &args.named {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("named argument must be KEY=JSON, got {:?}", pair))?;
        named.insert(key.to_string(), parse_value(raw));
    }

    let mut request = Request::new(args.function.as_str())?
        .with_positional(positional)
        .with_named(named);
    if args.deferred {
        request = request.deferred();
    }
    Ok(request)
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(function: &str) -> CallArgs {
        CallArgs {
            function: function.to_string(),
            args: Vec::new(),
            named: Vec::new(),
            deferred: false,
            wait: false,
            token: None,
        }
    }

    #[test]
    fn parse_value_falls_back_to_string() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("hello"), json!("hello"));
    }

    #[test]
    fn build_request_collects_arguments() {
        let mut call = args("util.add");
        call.args = vec!["1".into(), "2.5".into()];
        call.named = vec!["message=hi".into(), "ms=10".into()];
        call.deferred = true;

        let request = build_request(&call).unwrap();
        assert_eq!(request.function, "util.add");
        assert_eq!(request.positional, vec![json!(1), json!(2.5)]);
        assert_eq!(request.named.get("message"), Some(&json!("hi")));
        assert_eq!(request.named.get("ms"), Some(&json!(10)));
        assert!(request.headers.deferred);
    }

    #[test]
    fn build_request_rejects_malformed_named_argument() {
        let mut call = args("util.echo");
        call.named = vec!["no-equals".into()];
        assert!(build_request(&call).is_err());
    }

    #[test]
    fn build_request_rejects_empty_function() {
        assert!(build_request(&args("")).is_err());
    }
}
