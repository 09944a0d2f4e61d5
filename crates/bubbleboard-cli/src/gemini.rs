use std::future::Future;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use bubbleboard_core::config::SuggestSettings;
use bubbleboard_core::suggest::TextGenerator;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  instrument,
  warn
};

const TOP_K: u32 = 40;
const TOP_P: f64 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  contents:          Vec<Content<'a>>,
  generation_config: GenerationConfig
}

#[derive(Debug, Serialize)]
struct Content<'a> {
  parts: Vec<Part<'a>>
}

#[derive(Debug, Serialize)]
struct Part<'a> {
  text: &'a str
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature:       f64,
  top_k:             u32,
  top_p:             f64,
  max_output_tokens: u32
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateResponse {
  candidates: Vec<Candidate>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
  content: CandidateContent
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
  parts: Vec<CandidatePart>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidatePart {
  text: Option<String>
}

/// HTTP client for a `generateContent` style endpoint.
///
/// Without an API key every request fails, which the suggestion layer turns
/// into fallback content.
#[derive(Debug, Clone)]
pub struct GeminiClient {
  client:      reqwest::Client,
  endpoint:    String,
  api_key:     Option<String>,
  temperature: f64
}

impl GeminiClient {
  pub fn new(
    settings: &SuggestSettings
  ) -> anyhow::Result<Self> {
    let client =
      reqwest::Client::builder()
        .timeout(Duration::from_secs(
          settings.timeout_secs
        ))
        .build()
        .context(
          "failed building HTTP client \
           for suggestions"
        )?;

    if settings.api_key.is_none() {
      warn!(
        "no API key configured; \
         suggestions will use \
         fallback content"
      );
    }

    Ok(Self {
      client,
      endpoint: settings
        .endpoint
        .clone(),
      api_key: settings.api_key.clone(),
      temperature: settings.temperature
    })
  }

  #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
  async fn request(
    &self,
    prompt: &str
  ) -> anyhow::Result<String> {
    let Some(api_key) =
      self.api_key.as_deref()
    else {
      anyhow::bail!(
        "suggestion service has no API \
         key"
      );
    };

    let body = GenerateRequest {
      contents:          vec![Content {
        parts: vec![Part {
          text: prompt
        }]
      }],
      generation_config:
        GenerationConfig {
          temperature: self.temperature,
          top_k: TOP_K,
          top_p: TOP_P,
          max_output_tokens:
            MAX_OUTPUT_TOKENS
        }
    };

    let url = reqwest::Url::parse_with_params(
      &self.endpoint,
      &[("key", api_key)]
    )
    .with_context(|| {
      format!(
        "invalid suggestion endpoint: {}",
        self.endpoint
      )
    })?;

    let response = self
      .client
      .post(url)
      .json(&body)
      .send()
      .await
      .context(
        "failed requesting suggestion \
         service"
      )?;

    let status = response.status();
    let text =
      response.text().await.context(
        "failed reading suggestion \
         service response body"
      )?;

    if !status.is_success() {
      warn!(
        status = %status,
        "suggestion service returned \
         an error status"
      );
      return Err(anyhow!(
        "suggestion service returned \
         HTTP {status}"
      ));
    }

    debug!(
      bytes = text.len(),
      "suggestion service responded"
    );
    extract_text(&text)
  }
}

impl TextGenerator for GeminiClient {
  fn generate(
    &self,
    prompt: &str
  ) -> impl Future<
    Output = anyhow::Result<String>
  > + Send {
    self.request(prompt)
  }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(
  body: &str
) -> anyhow::Result<String> {
  let parsed: GenerateResponse =
    serde_json::from_str(body).context(
      "suggestion service response is \
       not JSON"
    )?;

  parsed
    .candidates
    .into_iter()
    .next()
    .and_then(|candidate| {
      candidate
        .content
        .parts
        .into_iter()
        .next()
    })
    .and_then(|part| part.text)
    .ok_or_else(|| {
      anyhow!(
        "suggestion service response \
         has no candidate text"
      )
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings(
    api_key: Option<&str>
  ) -> SuggestSettings {
    SuggestSettings {
      endpoint:     "http://127.0.0.1:9/generate".to_string(),
      api_key:      api_key.map(str::to_string),
      timeout_secs: 1,
      temperature:  0.8
    }
  }

  #[test]
  fn extracts_first_candidate_text() {
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"hello"},{"text":"ignored"}]}}]}"#;
    assert_eq!(
      extract_text(body)
        .expect("text present"),
      "hello"
    );
  }

  #[test]
  fn missing_candidates_is_an_error() {
    assert!(
      extract_text(r#"{"candidates":[]}"#)
        .is_err()
    );
    assert!(
      extract_text("<html>").is_err()
    );
  }

  #[test]
  fn request_body_uses_wire_names() {
    let body = GenerateRequest {
      contents:          vec![Content {
        parts: vec![Part { text: "hi" }]
      }],
      generation_config:
        GenerationConfig {
          temperature:       0.8,
          top_k:             TOP_K,
          top_p:             TOP_P,
          max_output_tokens:
            MAX_OUTPUT_TOKENS
        }
    };
    let json = serde_json::to_value(&body)
      .expect("serializes");
    assert_eq!(
      json["contents"][0]["parts"][0]
        ["text"],
      "hi"
    );
    assert_eq!(
      json["generationConfig"]["topK"],
      40
    );
    assert_eq!(
      json["generationConfig"]
        ["maxOutputTokens"],
      1024
    );
  }

  #[tokio::test]
  async fn missing_key_fails_without_network() {
    let client =
      GeminiClient::new(&settings(None))
        .expect("client builds");
    let err = client
      .generate("hello")
      .await
      .expect_err("no key configured");
    assert!(
      err.to_string().contains("API key")
    );
  }
}
