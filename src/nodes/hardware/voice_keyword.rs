//! Voice keyword source: pulses when the speech recognizer reports the
//! configured phrase.

use super::KEYWORD_DETECTED;
use crate::error::NodeError;
use crate::event::ListenerError;
use crate::nodes::catalog::{NodeFactory, NodeSetup};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

/// Voice keyword settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceKeywordSettings {
  /// Phrase to listen for.
  pub keyword: String,
  /// Compare case-sensitively.
  pub case_sensitive: bool,
  /// Match when the phrase occurs anywhere in the recognized text.
  pub partial_match: bool,
}

impl Default for VoiceKeywordSettings {
  fn default() -> Self {
    Self {
      keyword: "activate".to_string(),
      case_sensitive: false,
      partial_match: true,
    }
  }
}

impl VoiceKeywordSettings {
  /// Whether `heard` matches the configured keyword.
  pub fn matches(&self, heard: &str) -> bool {
    let keyword = self.keyword.trim();
    if keyword.is_empty() {
      return false;
    }
    let (heard, keyword) = if self.case_sensitive {
      (heard.trim().to_string(), keyword.to_string())
    } else {
      (heard.trim().to_lowercase(), keyword.to_lowercase())
    };
    if self.partial_match {
      heard.contains(&keyword)
    } else {
      heard == keyword
    }
  }
}

/// Installs `voiceKeyword` nodes.
pub struct VoiceKeywordFactory;

impl NodeFactory for VoiceKeywordFactory {
  fn kind(&self) -> &'static str {
    "voiceKeyword"
  }

  fn default_settings(&self) -> Value {
    json!({ "keyword": "activate", "caseSensitive": false, "partialMatch": true })
  }

  fn setup(&self, setup: NodeSetup) -> Result<(), NodeError> {
    let settings: VoiceKeywordSettings = setup.settings_as()?;
    let engine = setup.engine.downgrade();
    let node_id = setup.node_id;
    setup
      .engine
      .events()
      .subscribe_to_event_async(KEYWORD_DETECTED, setup.owner(), move |event| {
        let engine = engine.clone();
        let heard = event
          .data
          .get("keyword")
          .and_then(Value::as_str)
          .map(str::to_string);
        let matched = heard.as_deref().is_some_and(|heard| settings.matches(heard));
        Box::pin(async move {
          if let (true, Some(engine), Some(heard)) = (matched, engine.upgrade(), heard) {
            debug!(node = %node_id, keyword = %heard, "keyword matched");
            engine
              .pulse_node(node_id, Some(json!({ "keyword": heard })))
              .await;
          }
          Ok::<(), ListenerError>(())
        })
      });
    Ok(())
  }
}
