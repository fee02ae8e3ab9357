//! Callable implementations and their arguments.

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a callable.
pub type CallFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A registered implementation. Errors become `INTERNAL_ERROR` responses.
pub type Callable = Arc<dyn Fn(Args) -> CallFuture + Send + Sync>;

/// Wrap an async function as a [`Callable`].
pub fn callable<F, Fut>(f: F) -> Callable
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |args: Args| -> CallFuture { Box::pin(f(args)) })
}

/// Wrap a plain function as a [`Callable`].
///
/// The function runs on tokio's blocking pool, so it may block and a
/// timeout around the returned future still fires. A panic is re-raised on
/// the awaiting task.
pub fn sync_callable<F>(f: F) -> Callable
where
    F: Fn(Args) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |args: Args| -> CallFuture {
        let f = f.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(args)).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(anyhow!("function was cancelled: {}", err)),
            }
        })
    })
}

/// Arguments unpacked from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Map<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>, named: Map<String, Value>) -> Self {
        Self { positional, named }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .positional
            .get(index)
            .ok_or_else(|| anyhow!("missing positional argument {}", index))?;
        serde_json::from_value(value.clone())
            .with_context(|| format!("invalid positional argument {}", index))
    }

    /// Deserialize the required named argument `name`.
    pub fn named_arg<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        self.opt_named_arg(name)?
            .ok_or_else(|| anyhow!("missing named argument '{}'", name))
    }

    /// Deserialize the named argument `name` if it was supplied.
    pub fn opt_named_arg<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match self.named.get(name) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("invalid named argument '{}'", name)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Args {
        let mut named = Map::new();
        named.insert("ms".into(), json!(25));
        named.insert("label".into(), json!("x"));
        Args::new(vec![json!(1), json!("two")], named)
    }

    #[test]
    fn typed_positional_access() {
        let args = sample();
        assert_eq!(args.arg::<i64>(0).unwrap(), 1);
        assert_eq!(args.arg::<String>(1).unwrap(), "two");
    }

    #[test]
    fn missing_positional_is_an_error() {
        let err = sample().arg::<i64>(5).unwrap_err();
        assert_eq!(err.to_string(), "missing positional argument 5");
    }

    #[test]
    fn wrong_type_is_an_error() {
        let err = sample().arg::<i64>(1).unwrap_err();
        assert_eq!(err.to_string(), "invalid positional argument 1");
    }

    #[test]
    fn named_access() {
        let args = sample();
        assert_eq!(args.named_arg::<u64>("ms").unwrap(), 25);
        assert_eq!(args.opt_named_arg::<String>("nope").unwrap(), None);
        assert!(args.named_arg::<String>("nope").is_err());
    }

    #[tokio::test]
    async fn sync_and_async_wrappers_invoke() {
        let double = sync_callable(|args| Ok(json!(args.arg::<i64>(0)? * 2)));
        let echo = callable(|args: Args| async move {
            Ok::<_, anyhow::Error>(Value::Array(args.positional))
        });

        let args = Args::new(vec![json!(21)], Map::new());
        assert_eq!(double(args.clone()).await.unwrap(), json!(42));
        assert_eq!(echo(args).await.unwrap(), json!([21]));
    }

    #[tokio::test]
    async fn blocking_function_does_not_hold_the_runtime() {
        let slow = sync_callable(|_| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(json!("late"))
        });

        let started = std::time::Instant::now();
        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(20), slow(Args::default())).await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
    }
}
