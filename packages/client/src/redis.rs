//! Redis-compatible commands against a key-value collection.
//!
//! Every command is one `POST /_api/redis/{collection}` carrying the command
//! name and its arguments. The server answers with the command's reply in
//! `result`.

use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Redis<E: Executor> {
    executor: E,
    collection: String,
}

impl<E: Executor> ApiWrapper for Redis<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Redis<E> {
    pub fn new(executor: E, collection: impl Into<String>) -> Self {
        Self {
            executor,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn request(&self, command: &str, args: Vec<Value>) -> Result<Request> {
        if command.is_empty() {
            return Err(Error::client(ErrorKind::RedisCommand, "command name is empty"));
        }
        Ok(Request::post(format!("/_api/redis/{}", self.collection))
            .with_json_body(json!({"command": command, "args": args})))
    }

    /// Run any command and return its raw reply.
    pub fn command(&self, command: &str, args: &[Value]) -> Result<Output<E, Value>> {
        let request = self.request(command, args.to_vec())?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    /// Run a command whose reply is an integer.
    fn integer(&self, command: &str, args: Vec<Value>) -> Result<Output<E, i64>> {
        let request = self.request(command, args)?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.field::<i64>("result")?)
        })
    }

    /// Run a command whose reply is a bulk string or nil.
    fn bulk(&self, command: &str, args: Vec<Value>) -> Result<Output<E, Option<String>>> {
        let request = self.request(command, args)?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.field::<Option<String>>("result")?)
        })
    }

    /// `SET key value`, with an optional expiry in seconds.
    pub fn set(&self, key: &str, value: &str, expire_secs: Option<u64>) -> Result<Output<E, bool>> {
        let mut args = vec![json!(key), json!(value)];
        if let Some(secs) = expire_secs {
            args.extend([json!("EX"), json!(secs)]);
        }
        let request = self.request("SET", args)?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.body().get("result").and_then(Value::as_str) == Some("OK"))
        })
    }

    pub fn get(&self, key: &str) -> Result<Output<E, Option<String>>> {
        self.bulk("GET", vec![json!(key)])
    }

    /// `DEL`; returns how many keys existed.
    pub fn del(&self, keys: &[&str]) -> Result<Output<E, i64>> {
        self.integer("DEL", keys.iter().map(|key| json!(key)).collect())
    }

    pub fn exists(&self, keys: &[&str]) -> Result<Output<E, i64>> {
        self.integer("EXISTS", keys.iter().map(|key| json!(key)).collect())
    }

    pub fn incr_by(&self, key: &str, amount: i64) -> Result<Output<E, i64>> {
        self.integer("INCRBY", vec![json!(key), json!(amount)])
    }

    pub fn append(&self, key: &str, value: &str) -> Result<Output<E, i64>> {
        self.integer("APPEND", vec![json!(key), json!(value)])
    }

    /// `EXPIRE`; `false` when the key does not exist.
    pub fn expire(&self, key: &str, secs: u64) -> Result<Output<E, bool>> {
        let request = self.request("EXPIRE", vec![json!(key), json!(secs)])?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.field::<i64>("result")? == 1)
        })
    }

    /// Seconds to live: `-1` without expiry, `-2` for a missing key.
    pub fn ttl(&self, key: &str) -> Result<Output<E, i64>> {
        self.integer("TTL", vec![json!(key)])
    }

    /// `HSET key field value [field value ...]`; returns how many fields were added.
    pub fn hset(&self, key: &str, fields: &[(&str, &str)]) -> Result<Output<E, i64>> {
        let mut args = vec![json!(key)];
        for (field, value) in fields {
            args.extend([json!(field), json!(value)]);
        }
        self.integer("HSET", args)
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Output<E, Option<String>>> {
        self.bulk("HGET", vec![json!(key), json!(field)])
    }

    pub fn hgetall(&self, key: &str) -> Result<Output<E, Value>> {
        self.command("HGETALL", &[json!(key)])
    }

    pub fn lpush(&self, key: &str, values: &[&str]) -> Result<Output<E, i64>> {
        let mut args = vec![json!(key)];
        args.extend(values.iter().map(|value| json!(value)));
        self.integer("LPUSH", args)
    }

    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Output<E, Vec<String>>> {
        let request = self.request("LRANGE", vec![json!(key), json!(start), json!(stop)])?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.field::<Vec<String>>("result")?)
        })
    }

    pub fn sadd(&self, key: &str, members: &[&str]) -> Result<Output<E, i64>> {
        let mut args = vec![json!(key)];
        args.extend(members.iter().map(|member| json!(member)));
        self.integer("SADD", args)
    }

    pub fn smembers(&self, key: &str) -> Result<Output<E, Vec<String>>> {
        let request = self.request("SMEMBERS", vec![json!(key)])?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RedisCommand, &resp));
            }
            Ok(resp.field::<Vec<String>>("result")?)
        })
    }
}
