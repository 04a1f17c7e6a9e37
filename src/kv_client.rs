//! REST key-value store client (Upstash flavoured Redis over HTTPS)
//! One command per request, sent as a JSON array and answered with `{"result": ...}`
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::ScoutError;

const SERVICE: &str = "kv-store";

#[cfg(test)]
use mockall::automock;
#[cfg_attr(test, automock)]
pub trait KvClientTrait {
    /// Run one command, e.g. `["HSETNX", "tweets:exchanges", "123", "{...}"]`, and return its result
    fn execute(&self, args: &[String]) -> Result<Value, ScoutError>;
}

pub struct KvClient {
    agent: ureq::Agent,
    config: StoreConfig,
}

impl KvClient {
    pub fn new(config: &StoreConfig, timeout_secs: u64) -> Self {
        let agent: ureq::Agent = ureq::AgentBuilder::new()
            .timeout_read(Duration::from_secs(timeout_secs))
            .timeout_write(Duration::from_secs(timeout_secs))
            .build();
        KvClient {
            agent,
            config: config.clone(),
        }
    }
}

impl KvClientTrait for KvClient {
    fn execute(&self, args: &[String]) -> Result<Value, ScoutError> {
        let name = args.first().map(String::as_str).unwrap_or_default();
        debug!("{} {}", name, args.get(1).map(String::as_str).unwrap_or_default());

        let response = self
            .agent
            .request_url("POST", &self.config.url)
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .send_json(args);
        let body: Value = match response {
            Ok(response) => response.into_json().map_err(|e| {
                ScoutError::transport(SERVICE, format!("{} reply is unreadable: {}", name, e))
            })?,
            Err(ureq::Error::Status(code, response)) => {
                let body: Value = response.into_json().unwrap_or(Value::Null);
                return Err(ScoutError::transport(
                    SERVICE,
                    format!("{} failed with HTTP {}: {}", name, code, error_message(&body)),
                ));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ScoutError::transport(SERVICE, transport.to_string()))
            }
        };
        unwrap_result(name, body)
    }
}

/// Split a store reply into its result or its error
pub fn unwrap_result(name: &str, mut body: Value) -> Result<Value, ScoutError> {
    if body.get("error").is_some() {
        return Err(ScoutError::transport(
            SERVICE,
            format!("{} failed: {}", name, error_message(&body)),
        ));
    }
    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ScoutError::transport(
            SERVICE,
            format!("{} reply has no result: {}", name, body),
        )),
    }
}

fn error_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}

/// Build the argument list of one command
pub fn command(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

/// Read a flat `[k1, v1, k2, v2, ...]` listing, as returned by HGETALL
/// An odd number of entries means the store broke its contract
pub fn into_pairs(name: &str, result: Value) -> Result<Vec<(String, String)>, ScoutError> {
    let items = match result {
        Value::Null => return Ok(vec![]),
        Value::Array(items) => items,
        other => {
            return Err(ScoutError::transport(
                SERVICE,
                format!("{} returned a non-list reply: {}", name, other),
            ))
        }
    };
    if items.len() % 2 != 0 {
        return Err(ScoutError::transport(
            SERVICE,
            format!("{} returned an odd-length listing ({} items)", name, items.len()),
        ));
    }
    let mut strings = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(value) => strings.push(value),
            other => strings.push(other.to_string()),
        }
    }
    Ok(strings
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{command, into_pairs, unwrap_result, KvClient, KvClientTrait};
    use crate::config::StoreConfig;
    use crate::test_server::{closed_url, http_response, serve_once};

    fn client(url: url::Url) -> KvClient {
        let config = StoreConfig {
            url,
            token: "secret".to_string(),
        };
        KvClient::new(&config, 5)
    }

    #[test]
    fn command_args() {
        assert_eq!(
            command(&["HSETNX", "tweets:g", "1", "{}"]),
            vec!["HSETNX", "tweets:g", "1", "{}"]
        );
    }

    #[test]
    fn result_or_error() {
        assert_eq!(unwrap_result("HSETNX", json!({"result": 1})).unwrap(), json!(1));
        assert_eq!(unwrap_result("HGETALL", json!({"result": null})).unwrap(), json!(null));

        let err = unwrap_result("HSETNX", json!({"error": "WRONGTYPE"})).unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("WRONGTYPE"));

        assert!(unwrap_result("HSETNX", json!({"unexpected": true})).is_err());
    }

    #[test]
    fn pairs_from_listing() {
        let pairs = into_pairs("HGETALL", json!(["a", "1", "b", "2"])).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        assert!(into_pairs("HGETALL", json!([])).unwrap().is_empty());
        assert!(into_pairs("HGETALL", json!(null)).unwrap().is_empty());
    }

    #[test]
    fn odd_listing_is_rejected() {
        let err = into_pairs("HGETALL", json!(["a", "1", "b"])).unwrap_err();
        assert!(err.is_transport());
        assert!(into_pairs("HGETALL", json!({"a": "1"})).is_err());
    }

    #[test]
    fn execute_posts_command_array() {
        let (url, server) = serve_once(
            "/",
            http_response("200 OK", &[("Content-Type", "application/json")], r#"{"result": 1}"#),
        );
        let result = client(url)
            .execute(&command(&["HSETNX", "tweets:exchanges", "7", "{}"]))
            .unwrap();
        let captured = server.join().unwrap();

        assert_eq!(result, json!(1));
        assert!(captured.head.starts_with("POST / "));
        assert_eq!(captured.header("authorization").as_deref(), Some("Bearer secret"));
        let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent, json!(["HSETNX", "tweets:exchanges", "7", "{}"]));
    }

    #[test]
    fn rejected_token_is_transport() {
        let (url, server) = serve_once(
            "/",
            http_response(
                "401 Unauthorized",
                &[("Content-Type", "application/json")],
                r#"{"error": "bad token"}"#,
            ),
        );
        let err = client(url)
            .execute(&command(&["HSETNX", "tweets:exchanges", "7", "{}"]))
            .unwrap_err();
        server.join().unwrap();

        assert!(err.is_transport());
        assert!(err.to_string().contains("HTTP 401"));
        assert!(err.to_string().contains("bad token"));
    }

    #[test]
    fn command_error_reply_is_transport() {
        let (url, server) = serve_once(
            "/",
            http_response(
                "200 OK",
                &[("Content-Type", "application/json")],
                r#"{"error": "WRONGTYPE Operation against a key holding the wrong kind of value"}"#,
            ),
        );
        let err = client(url)
            .execute(&command(&["HGETALL", "groups"]))
            .unwrap_err();
        server.join().unwrap();
        assert!(err.is_transport());
    }

    #[test]
    fn unreachable_store_is_transport() {
        let err = client(closed_url("/"))
            .execute(&command(&["HGETALL", "groups"]))
            .unwrap_err();
        assert!(err.is_transport());
    }
}
