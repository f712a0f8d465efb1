use anyhow::bail;
use reqwest::Client;
use tracing::debug;

use crate::config::Config;

pub fn build_client(cfg: &Config) -> anyhow::Result<Client> {
    let client = Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .timeout(cfg.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    Ok(client)
}

/// GET `url` and return the body. Non-2xx responses are errors.
pub async fn fetch_html(client: &Client, url: &str) -> anyhow::Result<String> {
    debug!(url, "Visiting");

    let res = client.get(url).send().await?;
    let status = res.status();

    if !status.is_success() {
        bail!("unexpected status {} for {}", status, url);
    }

    Ok(res.text().await?)
}
