//! Sample processor: `hello` command and an echo of plain group messages.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use abot_core::{
    bot::Bot,
    errors::Error,
    formatting::escape_html,
    processor::{DispatchHandler, Processor},
    Result,
};

pub const SCOPE: &str = "myscope";

/// Stored under the `Myscope` key of the settings file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelloConfig {
    pub foo: i64,
    pub bar: String,
}

#[derive(Default)]
pub struct HelloProcessor {
    config: Mutex<HelloConfig>,
}

impl HelloProcessor {
    fn config(&self) -> HelloConfig {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Processor for HelloProcessor {
    fn help(&self) -> String {
        "/hello  Print hello world\n".to_string()
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn settings(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self.config()).ok()
    }

    fn apply_settings(&self, value: serde_json::Value) -> Result<()> {
        let cfg: HelloConfig = serde_json::from_value(value)?;
        let mut guard = self
            .config
            .lock()
            .map_err(|_| Error::Processor("hello config lock poisoned".to_string()))?;
        *guard = cfg;
        Ok(())
    }

    async fn process_command(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        command: &str,
        _args: &[String],
    ) -> Result<bool> {
        if command != "hello" {
            return Ok(false);
        }
        let cfg = self.config();
        let text = format!(
            "Hello World! foo={} bar={}",
            cfg.foo,
            escape_html(&cfg.bar)
        );
        bot.send_message_response(handler, &text, bot.new_response_options())
            .await;
        Ok(true)
    }

    async fn process_message(
        &self,
        bot: &Bot,
        handler: &DispatchHandler,
        text: &str,
    ) -> Result<bool> {
        let echo = format!("ECHO: {}", escape_html(text));
        bot.send_message_response(handler, &echo, bot.new_response_options())
            .await;
        Ok(true)
    }
}
