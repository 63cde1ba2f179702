//! HTTP plugin steps

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::config::{HttpMethod, StepAction, StepConfig};
use crate::credentials::CredentialStore;
use crate::hash::digest_all;
use crate::plugins::placeholders::{self, PlaceholderContext};
use crate::plugins::{StepContext, StepOutcome, StepRunner};
use crate::storage;

/// Runs a step against a remote endpoint over a shared client.
///
/// `${filePath}` templates get a staged temp copy that lives only for
/// the duration of the request.
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepRunner for HttpRunner {
    async fn run(
        &self,
        id: &str,
        step: &StepConfig,
        creds: Option<&CredentialStore>,
        ctx: &StepContext<'_>,
    ) -> StepOutcome {
        let StepAction::Http {
            method,
            headers,
            body,
            http_pass_code,
            http_fail_code,
        } = &step.action
        else {
            return StepOutcome::failure("step is not an http step");
        };

        let needs_path = placeholders::wants_file_path(&step.endpoint)
            || headers
                .values()
                .chain(body.values())
                .any(|template| placeholders::wants_file_path(template));
        let staging = if needs_path {
            match storage::stage_temp_copy(ctx.bytes, ctx.extension) {
                Ok(pair) => Some(pair),
                Err(err) => {
                    return StepOutcome::failure(format!("could not stage file for step: {}", err))
                }
            }
        } else {
            None
        };

        let needs_hashes = placeholders::wants_named_checksums(&step.endpoint)
            || headers
                .values()
                .chain(body.values())
                .any(|template| placeholders::wants_named_checksums(template));
        let hashes = needs_hashes.then(|| digest_all(ctx.bytes));
        let pctx = PlaceholderContext {
            file_path: staging.as_ref().map(|(_, path)| path.as_path()),
            bytes: ctx.bytes,
            hashes: hashes.as_ref(),
            creds,
        };

        let endpoint = match placeholders::substitute(&step.endpoint, &pctx) {
            Ok(url) => url,
            Err(err) => return StepOutcome::failure(err),
        };
        let header_values = match substitute_map(headers, &pctx) {
            Ok(values) => values,
            Err(err) => return StepOutcome::failure(err),
        };
        let body_values = match substitute_map(body, &pctx) {
            Ok(values) => values,
            Err(err) => return StepOutcome::failure(err),
        };

        let mut request = match method {
            HttpMethod::Get => {
                let mut url = endpoint.clone();
                if !body_values.is_empty() {
                    url.push('?');
                    url.push_str(&encode_pairs(&body_values));
                }
                self.client.get(url)
            }
            HttpMethod::Post => self
                .client
                .post(endpoint.as_str())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(encode_pairs(&body_values)),
            HttpMethod::PostMultipart => {
                let mut form = Form::new().part(
                    "file",
                    Part::bytes(ctx.bytes.to_vec()).file_name(ctx.clean_file_name.to_string()),
                );
                for (key, value) in &body_values {
                    form = form.text(key.clone(), value.clone());
                }
                self.client.post(endpoint.as_str()).multipart(form)
            }
        };
        request = request.timeout(step.timeout);
        for (key, value) in &header_values {
            request = request.header(key.as_str(), value.as_str());
        }

        debug!(step = id, endpoint = %endpoint, "running http step");

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return StepOutcome::failure(format!("Request timeout: {}", endpoint))
            }
            Err(err) => return StepOutcome::failure(format!("Request failed: {}", err)),
        };
        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return StepOutcome::failure(format!("Request failed: {}", err)),
        };

        if status == *http_pass_code {
            let prefix = placeholders::expected_prefix(&step.response);
            if !text.contains(prefix) {
                return StepOutcome::failure(format!(
                    "expected: \"{}\", received: {}",
                    prefix, text
                ));
            }
            let extracted = placeholders::extract(&step.response, &text);
            StepOutcome::success(text, extracted)
        } else if status == *http_fail_code {
            StepOutcome::failure(format!(
                "Request returned failure status {}: {}",
                status, text
            ))
        } else {
            StepOutcome::failure(format!(
                "Request returned unexpected status {}: {}",
                status, text
            ))
        }
    }
}

/// Substitute every value of a header or body map, sorted for a
/// stable request layout.
fn substitute_map(
    raw: &std::collections::HashMap<String, String>,
    ctx: &PlaceholderContext<'_>,
) -> Result<BTreeMap<String, String>, String> {
    raw.iter()
        .map(|(key, value)| Ok((key.clone(), placeholders::substitute(value, ctx)?)))
        .collect()
}

fn encode_pairs(values: &BTreeMap<String, String>) -> String {
    values
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}
